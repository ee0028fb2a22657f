//! XGBoost JSON artifact loader and tree-ensemble evaluator
//!
//! Reads the document written by `Booster.save_model("model.json")` and
//! scores it natively. Only the parts needed for `binary:logistic` gbtree
//! models are modelled; anything else is rejected at load time.

use serde::Deserialize;

use super::layout::{feature_names, FeatureVector, FEATURE_COUNT};
use super::{InferenceError, ModelLoadError, RiskModel, SchemaMismatch};

// ============================================================================
// ARTIFACT DOCUMENT
// ============================================================================

#[derive(Debug, Deserialize)]
struct XgbDocument {
    learner: Learner,
    #[serde(default)]
    version: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct Learner {
    #[serde(default)]
    attributes: LearnerAttributes,
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: Objective,
}

#[derive(Debug, Deserialize)]
struct GradientBooster {
    name: String,
    model: Option<GbTreeModel>,
}

/// Set by early stopping; prediction stops at this boosting round
#[derive(Debug, Default, Deserialize)]
struct LearnerAttributes {
    best_iteration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModel {
    #[serde(default)]
    gbtree_model_param: Option<GbTreeModelParam>,
    trees: Vec<RawTree>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModelParam {
    #[serde(default)]
    num_parallel_tree: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
    num_feature: String,
    #[serde(default)]
    num_class: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Objective {
    name: String,
}

/// `default_left` is an int array in most releases and a bool array in some
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum BoolOrInt {
    Bool(bool),
    Int(i64),
}

impl BoolOrInt {
    fn is_set(self) -> bool {
        match self {
            BoolOrInt::Bool(b) => b,
            BoolOrInt::Int(i) => i != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<BoolOrInt>,
    #[serde(default)]
    split_type: Vec<u8>,
}

// ============================================================================
// COMPILED TREES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f32),
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn compile(index: usize, raw: RawTree) -> Result<Self, ModelLoadError> {
        let malformed = |reason: String| ModelLoadError::MalformedTree { tree: index, reason };

        let n = raw.left_children.len();
        if n == 0 {
            return Err(malformed("tree has no nodes".to_string()));
        }
        if raw.right_children.len() != n
            || raw.split_indices.len() != n
            || raw.split_conditions.len() != n
            || raw.default_left.len() != n
        {
            return Err(malformed("node arrays have different lengths".to_string()));
        }
        if raw.split_type.iter().any(|&t| t != 0) {
            return Err(ModelLoadError::Unsupported(
                "categorical splits are not supported".to_string(),
            ));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let left = raw.left_children[i];
            let right = raw.right_children[i];

            if left == -1 {
                nodes.push(Node::Leaf(raw.split_conditions[i]));
                continue;
            }

            // Children always carry a larger id than their parent, which also
            // rules out cycles during evaluation.
            let child = |c: i64| -> Result<usize, ModelLoadError> {
                if c <= i as i64 || c >= n as i64 {
                    return Err(malformed(format!("node {} has invalid child {}", i, c)));
                }
                Ok(c as usize)
            };
            let left = child(left)?;
            let right = child(right)?;

            let feature = raw.split_indices[i];
            if feature < 0 || feature >= FEATURE_COUNT as i64 {
                return Err(malformed(format!(
                    "node {} splits on feature {} (model input has {})",
                    i, feature, FEATURE_COUNT
                )));
            }

            nodes.push(Node::Split {
                feature: feature as usize,
                threshold: raw.split_conditions[i],
                left,
                right,
                default_left: raw.default_left[i].is_set(),
            });
        }

        Ok(Self { nodes })
    }

    fn leaf_value(&self, x: &[f32; FEATURE_COUNT]) -> f32 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf(value) => return value,
                Node::Split { feature, threshold, left, right, default_left } => {
                    let value = x[feature];
                    idx = if value.is_nan() {
                        if default_left { left } else { right }
                    } else if value < threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

// ============================================================================
// MODEL
// ============================================================================

/// Gradient-boosted tree ensemble with a logistic link
#[derive(Debug, Clone)]
pub struct XgbModel {
    trees: Vec<Tree>,
    base_margin: f32,
    xgboost_version: Option<String>,
}

impl XgbModel {
    /// Parse and validate an XGBoost JSON document
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelLoadError> {
        let doc: XgbDocument = serde_json::from_slice(bytes)?;
        let learner = doc.learner;

        let objective = learner.objective.name.as_str();
        if objective != "binary:logistic" && objective != "reg:logistic" {
            return Err(ModelLoadError::Unsupported(format!("objective '{}'", objective)));
        }

        if let Some(num_class) = learner.learner_model_param.num_class.as_deref() {
            if num_class.parse::<u32>().unwrap_or(0) > 1 {
                return Err(ModelLoadError::Unsupported(format!(
                    "{} output classes",
                    num_class
                )));
            }
        }

        let num_feature: usize = learner
            .learner_model_param
            .num_feature
            .parse()
            .map_err(|_| {
                ModelLoadError::Unsupported(format!(
                    "num_feature '{}'",
                    learner.learner_model_param.num_feature
                ))
            })?;

        let expected: Vec<String> = feature_names().iter().map(|s| s.to_string()).collect();
        if num_feature != FEATURE_COUNT {
            return Err(SchemaMismatch {
                expected,
                actual: vec![format!("<{} unnamed features>", num_feature)],
            }
            .into());
        }
        if !learner.feature_names.is_empty() && learner.feature_names != expected {
            return Err(SchemaMismatch { expected, actual: learner.feature_names }.into());
        }

        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        if !(base_score > 0.0 && base_score < 1.0) {
            return Err(ModelLoadError::Unsupported(format!(
                "base_score {} outside (0, 1)",
                base_score
            )));
        }

        if learner.gradient_booster.name != "gbtree" {
            return Err(ModelLoadError::Unsupported(format!(
                "booster '{}'",
                learner.gradient_booster.name
            )));
        }
        let model = learner
            .gradient_booster
            .model
            .ok_or_else(|| ModelLoadError::Unsupported("gbtree without model".to_string()))?;

        let parallel = match model.gbtree_model_param.and_then(|p| p.num_parallel_tree) {
            Some(raw) => parse_count("num_parallel_tree", &raw)?.max(1),
            None => 1,
        };

        let mut trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, raw)| Tree::compile(i, raw))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(raw) = learner.attributes.best_iteration {
            let best_iteration = parse_count("best_iteration", &raw)?;
            let used = best_iteration.saturating_add(1).saturating_mul(parallel);
            trees.truncate(used);
        }

        let xgboost_version = if doc.version.is_empty() {
            None
        } else {
            Some(
                doc.version
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("."),
            )
        };

        Ok(Self {
            trees,
            base_margin: (base_score / (1.0 - base_score)).ln() as f32,
            xgboost_version,
        })
    }

    /// Raw margin before the logistic link
    fn margin(&self, x: &[f32; FEATURE_COUNT]) -> f32 {
        self.trees
            .iter()
            .fold(self.base_margin, |acc, tree| acc + tree.leaf_value(x))
    }
}

impl RiskModel for XgbModel {
    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2], InferenceError> {
        // XGBoost evaluates splits in single precision
        let x = features.to_f64_array().map(|v| v as f32);
        let margin = self.margin(&x) as f64;
        let p = 1.0 / (1.0 + (-margin).exp());
        Ok([1.0 - p, p])
    }

    fn kind(&self) -> String {
        match &self.xgboost_version {
            Some(v) => format!("xgboost {} gbtree", v),
            None => "xgboost gbtree".to_string(),
        }
    }

    fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

fn parse_count(name: &str, raw: &str) -> Result<usize, ModelLoadError> {
    raw.trim()
        .parse()
        .map_err(|_| ModelLoadError::Unsupported(format!("{} '{}'", name, raw)))
}

/// `base_score` is a float string, wrapped in brackets by XGBoost >= 2.1
fn parse_base_score(raw: &str) -> Result<f64, ModelLoadError> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    trimmed
        .parse::<f64>()
        .map_err(|_| ModelLoadError::Unsupported(format!("base_score '{}'", raw)))
}
