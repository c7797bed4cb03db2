use praetor_core::{Context, MethodError, MethodRef};
use praetor_policy::{Evaluation, PolicyDecisionPoint};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{EnforcementError, EnforcementResult};
use crate::information::PolicyInformationPoint;
use crate::request::Request;

// ---------------------------------------------------------------------------
// PolicyEnforcementPoint
// ---------------------------------------------------------------------------

/// Turns decisions into a yes/no answer and runs the triggered actions.
///
/// Only `Permit` authorizes. Every returned obligation runs; advice runs only
/// while advice execution is enabled (the default).
pub struct PolicyEnforcementPoint {
    pip: Arc<dyn PolicyInformationPoint>,
    pdp: PolicyDecisionPoint,
    execute_advice: bool,
}

impl PolicyEnforcementPoint {
    pub fn new(pip: Arc<dyn PolicyInformationPoint>, pdp: PolicyDecisionPoint) -> Self {
        Self {
            pip,
            pdp,
            execute_advice: true,
        }
    }

    pub fn with_execute_advice(mut self, execute_advice: bool) -> Self {
        self.execute_advice = execute_advice;
        self
    }

    pub fn executes_advice(&self) -> bool {
        self.execute_advice
    }

    pub fn enable_advice(&mut self) -> &mut Self {
        self.execute_advice = true;
        self
    }

    pub fn disable_advice(&mut self) -> &mut Self {
        self.execute_advice = false;
        self
    }

    pub fn pdp(&self) -> &PolicyDecisionPoint {
        &self.pdp
    }

    pub fn authorize(&self, request: &Request) -> EnforcementResult<bool> {
        self.decide(request).map(|(authorized, _)| authorized)
    }

    /// Like [`authorize`](Self::authorize) but also returns the full evaluation.
    pub fn decide(&self, request: &Request) -> EnforcementResult<(bool, Evaluation)> {
        let ctx = self.pip.create_context(request);
        let evaluation = self.pdp.evaluate(&*ctx);
        let authorized = evaluation.is_permit();
        info!(
            outcome = %evaluation.outcome,
            authorized,
            obligations = evaluation.obligations.len(),
            advice = evaluation.advice.len(),
            "authorization decided"
        );

        for method in &evaluation.obligations {
            self.run(method, &*ctx)
                .map_err(|source| EnforcementError::ObligationFailed {
                    method: method.clone(),
                    source,
                })?;
        }

        if self.execute_advice {
            for method in &evaluation.advice {
                self.run(method, &*ctx)
                    .map_err(|source| EnforcementError::AdviceFailed {
                        method: method.clone(),
                        source,
                    })?;
            }
        } else if !evaluation.advice.is_empty() {
            debug!(skipped = evaluation.advice.len(), "advice execution disabled");
        }

        Ok((authorized, evaluation))
    }

    fn run(&self, method: &MethodRef, ctx: &dyn Context) -> Result<(), MethodError> {
        debug!(method = %method, "running action");
        self.pdp
            .registry()
            .call_action(method, ctx)
            .inspect_err(|e| warn!(method = %method, error = %e, "action failed"))
    }
}
