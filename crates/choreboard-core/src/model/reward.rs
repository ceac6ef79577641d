//! Rewards, bonuses, penalties and parents.

use serde::{Deserialize, Serialize};

/// Something a kid can spend points on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub id: String,
    pub name: String,
    pub cost: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl Reward {
    pub fn new(name: impl Into<String>, cost: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            cost,
            description: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bonus {
    pub id: String,
    pub name: String,
    pub points: f64,
}

impl Bonus {
    pub fn new(name: impl Into<String>, points: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            points: points.abs(),
        }
    }
}

/// Penalty points are stored positive and deducted when applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Penalty {
    pub id: String,
    pub name: String,
    pub points: f64,
}

impl Penalty {
    pub fn new(name: impl Into<String>, points: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            points: points.abs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub associated_kids: Vec<String>,
}

impl Parent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            associated_kids: Vec::new(),
        }
    }
}
