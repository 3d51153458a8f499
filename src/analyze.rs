//! Structure analysis
//!
//! Classifies the shape of a JSON value and recommends a storage model.
//! The result is advisory; it never gates which conversions may run.

use crate::types::ValueKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Sql,
    Nosql,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureAnalysis {
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub is_flat: bool,
    pub is_nested: bool,
    pub is_relational: bool,
    pub depth: usize,
    pub has_arrays: bool,
    pub has_objects: bool,
    pub complexity: Complexity,
    pub recommendation: Recommendation,
    pub item_count: usize,
    /// Field names seen in the sample, in first-seen order
    pub fields: Vec<String>,
}

impl StructureAnalysis {
    fn new(kind: ValueKind) -> Self {
        StructureAnalysis {
            kind,
            is_flat: true,
            is_nested: false,
            is_relational: false,
            depth: 0,
            has_arrays: false,
            has_objects: false,
            complexity: Complexity::Simple,
            recommendation: Recommendation::Nosql,
            item_count: 0,
            fields: Vec::new(),
        }
    }

    fn add_field(&mut self, key: &str) {
        if !self.fields.iter().any(|f| f == key) {
            self.fields.push(key.to_string());
        }
    }
}

/// Analyzes JSON values using a bounded sample of array elements
#[derive(Debug, Clone)]
pub struct StructureAnalyzer {
    sample_size: usize,
}

impl Default for StructureAnalyzer {
    fn default() -> Self {
        StructureAnalyzer { sample_size: 10 }
    }
}

impl StructureAnalyzer {
    pub fn new(sample_size: usize) -> Self {
        StructureAnalyzer {
            sample_size: sample_size.max(1),
        }
    }

    pub fn analyze(&self, value: &Value) -> StructureAnalysis {
        let mut analysis = StructureAnalysis::new(ValueKind::of(value));

        match value {
            Value::Array(items) => {
                analysis.item_count = items.len();
                // Only the leading elements are inspected; later heterogeneity is missed
                for item in items.iter().take(self.sample_size) {
                    analysis.depth = analysis.depth.max(depth_of(item, 0));
                    if let Value::Object(obj) = item {
                        analyze_object(obj, &mut analysis);
                    }
                }
            }
            Value::Object(obj) => {
                analysis.item_count = 1;
                analysis.depth = depth_of(value, 0);
                analyze_object(obj, &mut analysis);
            }
            _ => {}
        }

        if analysis.depth > 2 {
            analysis.is_nested = true;
        }
        if analysis.is_nested {
            analysis.is_flat = false;
        }

        analysis.is_relational = analysis.has_arrays && analysis.has_objects;
        analysis.complexity = if analysis.is_relational {
            Complexity::Complex
        } else if analysis.is_nested {
            Complexity::Moderate
        } else {
            Complexity::Simple
        };

        analysis.recommendation = if analysis.is_relational
            || (analysis.depth > 1 && analysis.has_arrays)
        {
            Recommendation::Both
        } else if analysis.is_flat && analysis.item_count > 100 {
            Recommendation::Sql
        } else {
            Recommendation::Nosql
        };

        analysis
    }
}

/// Shorthand for analysis with the default sample size
pub fn analyze(value: &Value) -> StructureAnalysis {
    StructureAnalyzer::default().analyze(value)
}

/// Nesting depth of `value` when it sits at `current` levels down
///
/// Containers only add a level when they hold other containers.
fn depth_of(value: &Value, current: usize) -> usize {
    let children: Box<dyn Iterator<Item = &Value>> = match value {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(obj) => Box::new(obj.values()),
        _ => return current,
    };

    children
        .filter(|child| matches!(child, Value::Array(_) | Value::Object(_)))
        .map(|child| depth_of(child, current + 1))
        .fold(current, usize::max)
}

fn analyze_object(obj: &Map<String, Value>, analysis: &mut StructureAnalysis) {
    for (key, value) in obj.iter() {
        analysis.add_field(key);

        match value {
            Value::Array(items) => {
                analysis.has_arrays = true;
                if matches!(items.first(), Some(Value::Object(_) | Value::Array(_))) {
                    analysis.is_nested = true;
                    analysis.is_flat = false;
                }
            }
            Value::Object(_) => {
                analysis.has_objects = true;
                analysis.is_nested = true;
                analysis.is_flat = false;
            }
            _ => {}
        }
    }
}
