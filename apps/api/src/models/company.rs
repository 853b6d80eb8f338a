//! Reference-store rows for company lookup.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Search hit from the reference store: just enough to fetch the detail row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CompanySummary {
    pub id: Uuid,
    pub name: String,
}

/// Full company record. The six optional fact fields drive the
/// completeness score computed by the retrieval stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CompanyDetail {
    pub id: Uuid,
    pub name: String,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub employee_count: Option<i32>,
    pub founded_year: Option<i32>,
    pub website: Option<String>,
    pub description: Option<String>,
}

impl CompanyDetail {
    pub const OPTIONAL_FIELD_COUNT: usize = 6;

    /// Presence of each optional fact field, in a stable order.
    pub fn optional_field_presence(&self) -> [(&'static str, bool); Self::OPTIONAL_FIELD_COUNT] {
        [
            ("industry", self.industry.is_some()),
            ("location", self.location.is_some()),
            ("employee_count", self.employee_count.is_some()),
            ("founded_year", self.founded_year.is_some()),
            ("website", self.website.is_some()),
            ("description", self.description.is_some()),
        ]
    }

    pub fn filled_optional_fields(&self) -> usize {
        self.optional_field_presence()
            .iter()
            .filter(|(_, filled)| *filled)
            .count()
    }
}
