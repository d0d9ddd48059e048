//! Context-sufficiency self-review.
//!
//! An agent whose persona carries a review instruction first answers with a
//! bare `True` or `False`: is the retrieved context enough to answer? The
//! token's log-probability turns that into a confidence score, and the
//! verdict decides which follow-up instruction drives the next round.

use crate::provider::CompletionResponse;

/// Outcome of a self-review round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SufficiencyVerdict {
    /// The model said `True` with confidence at or above the threshold.
    Sufficient { confidence: f64 },
    /// The model said `False`, or said `True` without enough confidence.
    /// `confidence` is `None` when the service returned no log-probabilities.
    Insufficient { confidence: Option<f64> },
}

impl SufficiencyVerdict {
    /// Interpret a final (tool-free) response. Returns `None` unless the
    /// content is exactly `True` or `False`.
    pub fn from_response(response: &CompletionResponse, threshold: f64) -> Option<Self> {
        let claims_sufficient = match response.content.as_deref()? {
            "True" => true,
            "False" => false,
            _ => return None,
        };

        let confidence = response
            .logprobs
            .as_ref()
            .and_then(|tokens| tokens.first())
            .map(|t| confidence_percent(t.logprob));

        Some(match confidence {
            Some(score) if claims_sufficient && score >= threshold => {
                Self::Sufficient { confidence: score }
            }
            _ => Self::Insufficient { confidence },
        })
    }

    pub fn is_sufficient(&self) -> bool {
        matches!(self, Self::Sufficient { .. })
    }
}

/// `exp(logprob)` as a percentage rounded to two decimals.
pub fn confidence_percent(logprob: f64) -> f64 {
    (logprob.exp() * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TokenLogprob;

    fn verdict_response(content: &str, logprob: Option<f64>) -> CompletionResponse {
        let response = CompletionResponse::text(content);
        match logprob {
            Some(lp) => response.with_logprobs(vec![TokenLogprob {
                token: content.into(),
                logprob: lp,
            }]),
            None => response,
        }
    }

    #[test]
    fn confident_true_is_sufficient() {
        let v = SufficiencyVerdict::from_response(&verdict_response("True", Some(-0.01)), 80.0);
        assert_eq!(v, Some(SufficiencyVerdict::Sufficient { confidence: 99.0 }));
    }

    #[test]
    fn unsure_true_is_insufficient() {
        // exp(-0.5) ~ 60.65%
        let v = SufficiencyVerdict::from_response(&verdict_response("True", Some(-0.5)), 80.0)
            .unwrap();
        assert_eq!(v, SufficiencyVerdict::Insufficient { confidence: Some(60.65) });
    }

    #[test]
    fn false_is_insufficient_regardless_of_confidence() {
        let v = SufficiencyVerdict::from_response(&verdict_response("False", Some(0.0)), 80.0)
            .unwrap();
        assert!(!v.is_sufficient());
    }

    #[test]
    fn missing_logprobs_is_insufficient() {
        let v = SufficiencyVerdict::from_response(&verdict_response("True", None), 80.0);
        assert_eq!(v, Some(SufficiencyVerdict::Insufficient { confidence: None }));
    }

    #[test]
    fn other_content_is_not_a_verdict() {
        assert!(SufficiencyVerdict::from_response(&verdict_response("true", Some(0.0)), 80.0)
            .is_none());
        assert!(SufficiencyVerdict::from_response(&CompletionResponse::default(), 80.0).is_none());
    }
}
