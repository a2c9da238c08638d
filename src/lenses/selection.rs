use super::{ApplyClaim, LensDescriptor};
use crate::engine::{CameraSession, CatalogCallback};
use crate::error::SessionError;
use crate::scope::Handle;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Work the controller must carry out after a selection state change
#[derive(Debug, Clone, PartialEq)]
pub enum LensAction {
    /// Issue an apply for this lens on the session
    Apply(LensDescriptor),
    /// Refresh the selection list with this catalog
    ShowCatalog(Vec<LensDescriptor>),
}

/// Catalog, applied lens and the at-most-once apply of a requested lens
#[derive(Debug)]
pub struct LensSelectionState {
    group_ids: BTreeSet<String>,
    catalog: Vec<LensDescriptor>,
    applied_id: Option<String>,
    apply_requested: Option<String>,
    claim: ApplyClaim,
    default_applied: bool,
    deliveries: u64,
}

impl LensSelectionState {
    pub fn new<I, S>(group_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_ids: group_ids.into_iter().map(Into::into).collect(),
            catalog: Vec::new(),
            applied_id: None,
            apply_requested: None,
            claim: ApplyClaim::new(),
            default_applied: false,
            deliveries: 0,
        }
    }

    /// Start the catalog query for the configured groups on `session`
    pub fn observe(&self, session: &dyn CameraSession, on_result: CatalogCallback) -> Handle {
        info!("Observing lens catalog for groups {:?}", self.group_ids);
        session.observe_lenses(&self.group_ids, on_result)
    }

    /// Record the lens to apply once it shows up in the catalog
    pub fn request_apply<S: Into<String>>(&mut self, lens_id: S) -> Option<LensAction> {
        let lens_id = lens_id.into();
        if self.apply_requested.as_deref() != Some(lens_id.as_str()) {
            // A new target gets its own claim
            self.claim = ApplyClaim::new();
            self.apply_requested = Some(lens_id);
        }
        self.try_apply_requested()
    }

    /// Replace the catalog with a new delivery
    pub fn on_catalog(&mut self, lenses: Vec<LensDescriptor>) -> Vec<LensAction> {
        self.deliveries += 1;
        self.catalog = lenses;
        debug!(
            "Lens catalog delivery #{} with {} lenses",
            self.deliveries,
            self.catalog.len()
        );

        if self.apply_requested.is_some() {
            return self.try_apply_requested().into_iter().collect();
        }

        let mut actions = vec![LensAction::ShowCatalog(self.catalog.clone())];
        if !self.default_applied {
            if let Some(first) = self.catalog.first() {
                self.default_applied = true;
                debug!("Applying default lens {}", first.id);
                actions.push(LensAction::Apply(first.clone()));
            }
        }
        actions
    }

    /// User-driven selection: always resolves to an apply of a catalog lens
    pub fn select(&self, lens_id: &str) -> Result<LensDescriptor, SessionError> {
        self.find(lens_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownLens {
                lens_id: lens_id.to_string(),
            })
    }

    /// Record a successful apply
    pub fn mark_applied<S: Into<String>>(&mut self, lens_id: S) {
        self.applied_id = Some(lens_id.into());
    }

    pub fn group_ids(&self) -> &BTreeSet<String> {
        &self.group_ids
    }

    pub fn catalog(&self) -> &[LensDescriptor] {
        &self.catalog
    }

    pub fn applied_id(&self) -> Option<&str> {
        self.applied_id.as_deref()
    }

    pub fn apply_requested(&self) -> Option<&str> {
        self.apply_requested.as_deref()
    }

    /// Whether the requested lens has been claimed for apply
    pub fn applied_once(&self) -> bool {
        self.claim.is_claimed()
    }

    /// Shared claim of the current request
    pub fn claim(&self) -> ApplyClaim {
        self.claim.clone()
    }

    pub fn deliveries(&self) -> u64 {
        self.deliveries
    }

    fn find(&self, lens_id: &str) -> Option<&LensDescriptor> {
        self.catalog.iter().find(|lens| lens.id == lens_id)
    }

    fn try_apply_requested(&self) -> Option<LensAction> {
        let target = self.apply_requested.as_deref()?;
        let Some(lens) = self.find(target) else {
            debug!("Requested lens {} not in catalog yet", target);
            return None;
        };

        if self.claim.try_claim() {
            info!("Claimed apply of requested lens {}", target);
            Some(LensAction::Apply(lens.clone()))
        } else {
            debug!("Requested lens {} already claimed, skipping", target);
            None
        }
    }
}
