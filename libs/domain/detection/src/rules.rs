// [libs/domain/detection/src/rules.rs]
/*!
 * =================================================================
 * APARATO: BLOCKING RULE EVALUATOR (V11.0 - CONDITION ORACLE)
 * CLASIFICACIÓN: DOMAIN ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: EVALUACIÓN DEL ÁRBOL DE CONDICIONES POR EVENTO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. GRAMMAR: Nodos {"all":[...]}, {"any":[...]} y hojas
 *    {"metric"|"field", "op", "value"}; los árboles malformados se
 *    reportan como fallo de validación, jamás disparan.
 * 2. PRIORITY TIE-BREAK: Entre reglas coincidentes gana la mayor
 *    severidad; a severidad igual, la de menor 'priority'.
 * 3. AUDIT RETENTION: Las reglas deshabilitadas se ignoran aguas
 *    arriba (el repositorio solo entrega habilitadas).
 * =================================================================
 */

use crate::errors::DetectionError;
use guardian_domain_models::blocking::BlockingRuleRecord;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Contexto plano contra el que se resuelven métricas y campos.
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    /// Métricas numéricas (ventanas conductuales + reputación).
    pub metrics: HashMap<String, f64>,
    /// Campos textuales (país, usuario objetivo, método de autenticación).
    pub fields: HashMap<String, String>,
}

impl RuleContext {
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}

/// Veredicto de la capa de reglas para un evento.
#[derive(Debug, Clone)]
pub struct RuleVerdict {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: u8,
    pub block_duration_minutes: Option<i64>,
    pub auto_unblock: bool,
    pub priority: i32,
}

pub struct RuleEvaluator;

impl RuleEvaluator {
    /**
     * Evalúa el set de reglas habilitadas y retorna el veredicto ganador.
     *
     * El puntaje de la capa es la severidad de la regla ganadora; 0 si
     * ninguna coincide.
     */
    pub fn evaluate(rules: &[BlockingRuleRecord], context: &RuleContext) -> Option<RuleVerdict> {
        let mut winning_verdict: Option<RuleVerdict> = None;

        for rule in rules.iter().filter(|r| r.enabled) {
            match Self::evaluate_node(&rule.conditions, context) {
                Ok(true) => {
                    let candidate = RuleVerdict {
                        rule_id: rule.id.clone(),
                        rule_name: rule.name.clone(),
                        severity: rule.severity,
                        block_duration_minutes: rule.block_duration_minutes,
                        auto_unblock: rule.auto_unblock,
                        priority: rule.priority,
                    };

                    let should_replace = match &winning_verdict {
                        None => true,
                        Some(current) => {
                            candidate.severity > current.severity
                                || (candidate.severity == current.severity
                                    && candidate.priority < current.priority)
                        }
                    };

                    if should_replace {
                        winning_verdict = Some(candidate);
                    }
                }
                Ok(false) => {}
                Err(grammar_fault) => {
                    warn!(
                        "⚠️ [RULE_BYPASS]: Rule '{}' carries a malformed condition tree: {}",
                        rule.name, grammar_fault
                    );
                }
            }
        }

        winning_verdict
    }

    fn evaluate_node(node: &Value, context: &RuleContext) -> Result<bool, DetectionError> {
        let tree = node.as_object().ok_or_else(|| {
            DetectionError::MalformedConditionTree("node is not an object".to_string())
        })?;

        if let Some(children) = tree.get("all") {
            let branches = children.as_array().ok_or_else(|| {
                DetectionError::MalformedConditionTree("'all' must hold an array".to_string())
            })?;
            for branch in branches {
                if !Self::evaluate_node(branch, context)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }

        if let Some(children) = tree.get("any") {
            let branches = children.as_array().ok_or_else(|| {
                DetectionError::MalformedConditionTree("'any' must hold an array".to_string())
            })?;
            for branch in branches {
                if Self::evaluate_node(branch, context)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        Self::evaluate_leaf(tree, context)
    }

    fn evaluate_leaf(
        leaf: &serde_json::Map<String, Value>,
        context: &RuleContext,
    ) -> Result<bool, DetectionError> {
        let operator = leaf
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| DetectionError::MalformedConditionTree("leaf without 'op'".to_string()))?;

        // Hoja de campo textual (país, usuario, método).
        if let Some(field_name) = leaf.get("field").and_then(Value::as_str) {
            let observed = context.fields.get(field_name).map(String::as_str).unwrap_or("");
            return match operator {
                "eq" => Ok(leaf.get("value").and_then(Value::as_str) == Some(observed)),
                "neq" => Ok(leaf.get("value").and_then(Value::as_str) != Some(observed)),
                "in" | "not_in" => {
                    let catalog = leaf
                        .get("value")
                        .and_then(Value::as_array)
                        .ok_or_else(|| {
                            DetectionError::MalformedConditionTree(
                                "'in' expects an array value".to_string(),
                            )
                        })?;
                    let contained =
                        catalog.iter().filter_map(Value::as_str).any(|entry| entry == observed);
                    Ok(if operator == "in" { contained } else { !contained })
                }
                other => Err(DetectionError::MalformedConditionTree(format!(
                    "unsupported field operator '{other}'"
                ))),
            };
        }

        // Hoja de métrica numérica.
        let metric_name = leaf.get("metric").and_then(Value::as_str).ok_or_else(|| {
            DetectionError::MalformedConditionTree("leaf without 'metric' nor 'field'".to_string())
        })?;

        let threshold = leaf.get("value").and_then(Value::as_f64).ok_or_else(|| {
            DetectionError::MalformedConditionTree("metric leaf expects a numeric value".to_string())
        })?;

        let observed = context.metrics.get(metric_name).copied().unwrap_or(0.0);

        match operator {
            "gte" => Ok(observed >= threshold),
            "gt" => Ok(observed > threshold),
            "lte" => Ok(observed <= threshold),
            "lt" => Ok(observed < threshold),
            "eq" => Ok((observed - threshold).abs() < f64::EPSILON),
            other => Err(DetectionError::MalformedConditionTree(format!(
                "unsupported metric operator '{other}'"
            ))),
        }
    }
}
