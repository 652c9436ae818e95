//! Per-column filter, sort, formatting and validation settings

use serde::{Deserialize, Serialize};
use tabula_core::Value;
use unicase::UniCase;

/// Data filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterCondition {
    #[default]
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Empty,
    NotEmpty,
}

impl FilterCondition {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
            Self::Empty => "is empty",
            Self::NotEmpty => "is not empty",
        }
    }

    /// Returns true if this condition compares against a value
    pub fn requires_value(&self) -> bool {
        !matches!(self, Self::Empty | Self::NotEmpty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataFilter {
    pub condition: FilterCondition,
    pub value: String,
    pub case_sensitive: bool,
}

impl DataFilter {
    pub fn new(condition: FilterCondition, value: impl Into<String>) -> Self {
        Self {
            condition,
            value: value.into(),
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    /// A value-based condition with an empty operand filters nothing
    pub fn is_active(&self) -> bool {
        !self.condition.requires_value() || !self.value.is_empty()
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self.condition {
            FilterCondition::Empty => return value.is_blank(),
            FilterCondition::NotEmpty => return !value.is_blank(),
            _ => {}
        }
        let text = value.display_text();
        if self.case_sensitive {
            return match self.condition {
                FilterCondition::Equals => text == self.value,
                FilterCondition::Contains => text.contains(&self.value),
                FilterCondition::StartsWith => text.starts_with(&self.value),
                FilterCondition::EndsWith => text.ends_with(&self.value),
                FilterCondition::Empty | FilterCondition::NotEmpty => false,
            };
        }
        if self.condition == FilterCondition::Equals {
            return UniCase::new(text.as_str()) == UniCase::new(self.value.as_str());
        }
        let haystack = text.to_lowercase();
        let needle = self.value.to_lowercase();
        match self.condition {
            FilterCondition::Contains => haystack.contains(&needle),
            FilterCondition::StartsWith => haystack.starts_with(&needle),
            FilterCondition::EndsWith => haystack.ends_with(&needle),
            _ => false,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    pub fn toggle(&self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// A column's place in a multi-column sort. Lower priority sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSpec {
    pub direction: SortDirection,
    pub priority: u32,
}

impl SortSpec {
    pub fn ascending(priority: u32) -> Self {
        Self {
            direction: SortDirection::Ascending,
            priority,
        }
    }

    pub fn descending(priority: u32) -> Self {
        Self {
            direction: SortDirection::Descending,
            priority,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

/// Visual formatting for a cell or column
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CellFormat {
    pub bold: bool,
    pub italic: bool,
    pub text_color: Option<String>,
    pub background_color: Option<String>,
    pub align: Option<Alignment>,
}

/// Local checks run before any mutation is sent
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    pub required: bool,
    pub pattern: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValidationRules {
    pub fn is_empty(&self) -> bool {
        !self.required && self.pattern.is_none() && self.min.is_none() && self.max.is_none()
    }
}

/// Everything configured on one column of one table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnFilter {
    pub data_filter: Option<DataFilter>,
    pub sorting: Option<SortSpec>,
    pub formatting: Option<CellFormat>,
    pub validation: Option<ValidationRules>,
}

impl ColumnFilter {
    pub fn filtered_by(filter: DataFilter) -> Self {
        Self {
            data_filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn sorted_by(spec: SortSpec) -> Self {
        Self {
            sorting: Some(spec),
            ..Default::default()
        }
    }

    pub fn validated_by(rules: ValidationRules) -> Self {
        Self {
            validation: Some(rules),
            ..Default::default()
        }
    }
}
