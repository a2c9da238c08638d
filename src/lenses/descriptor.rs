use serde::{Deserialize, Serialize};

/// Camera facing a lens was authored for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LensFacing {
    Front,
    Back,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LensDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Icon reference shown in the selection list
    #[serde(default)]
    pub icon_uri: Option<String>,
    #[serde(default)]
    pub facing_preference: LensFacing,
}

impl LensDescriptor {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            name: None,
            icon_uri: None,
            facing_preference: LensFacing::None,
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_icon<S: Into<String>>(mut self, icon_uri: S) -> Self {
        self.icon_uri = Some(icon_uri.into());
        self
    }

    pub fn with_facing(mut self, facing: LensFacing) -> Self {
        self.facing_preference = facing;
        self
    }
}
