use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A spending or income category. Shared categories have no owner and are
/// visible to every user; owned categories are visible only to their owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub order_index: i64,
}

impl Category {
    pub fn new(user_id: Option<Uuid>, name: String, order_index: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            description: None,
            order_index,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.user_id.is_none()
    }

    /// Find a category by name (case-insensitive) in a slice.
    pub fn find_by_name<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
        let lower = name.to_lowercase();
        categories.iter().find(|c| c.name.to_lowercase() == lower)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}
