use std::collections::BTreeMap;

use behex_core::Result;
use rand::Rng;

/// Who is sitting in front of the screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    /// Extra dialog fields the scaffolding does not interpret.
    pub extra: BTreeMap<String, String>,
}

impl Subject {
    pub fn new(id: impl Into<String>) -> Self {
        Subject {
            id: id.into(),
            age: None,
            gender: None,
            extra: BTreeMap::new(),
        }
    }

    /// Placeholder identity used until the dialog has run: `test_NNN`
    /// with a random suffix, so stray pilot files do not collide.
    pub fn test<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Subject::new(format!("test_{:03}", rng.random_range(0..1000)))
    }
}

/// Subject-info dialog collaborator.
///
/// Returns `None` when the operator cancelled the dialog, which callers
/// treat as the quit signal.
pub trait SubjectInfo {
    fn collect(&mut self, default: &Subject) -> Result<Option<Subject>>;
}
