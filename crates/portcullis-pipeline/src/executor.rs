//! The phase executor.
//!
//! One [`Pipeline::run`] call drives a request through the phase table.
//! The walk visits every phase in order but only runs the ones whose
//! track matches the run's current track: a run starts on the normal
//! track and diverts onto the error track when a handler fails, when no
//! content-producing handler matches, or when response serialization
//! fails. Once diverted, a run never returns to the normal track.

use crate::binder::{bind_entry, resolve_args};
use futures_util::future::join_all;
use http::StatusCode;
use portcullis_core::{
    ConcurrencyPolicy, GateError, Phase, PhaseSpec, RouteEntry, RouteTable, Scope, PHASES,
};
use portcullis_render::{Rendered, SendHandler};
use portcullis_router::PathParams;
use std::sync::Arc;

/// The request pipeline: the application's route table plus the two send
/// slots.
///
/// Cheap to clone; one pipeline serves every request of an application.
#[derive(Clone)]
pub struct Pipeline {
    table: Arc<RouteTable>,
    send: Arc<dyn SendHandler>,
    send_error: Arc<dyn SendHandler>,
}

impl Pipeline {
    /// Builds a pipeline over a frozen route table.
    #[must_use]
    pub fn new(
        table: Arc<RouteTable>,
        send: Arc<dyn SendHandler>,
        send_error: Arc<dyn SendHandler>,
    ) -> Self {
        Self {
            table,
            send,
            send_error,
        }
    }

    /// Runs one request to completion and returns the serialized
    /// response.
    pub async fn run(&self, scope: Scope) -> Rendered {
        let mut on_error = false;
        let mut rendered = None;

        for spec in &PHASES {
            if spec.error_track != on_error {
                continue;
            }
            if spec.internal {
                self.run_send_slot(&scope, spec, &mut on_error, &mut rendered)
                    .await;
                continue;
            }

            let matched = self.matched_entries(&scope, spec.phase);
            if spec.phase == Phase::Process && matched.is_empty() {
                tracing::debug!(line = %scope.lock().request_line(), "no content handler matched");
                divert(
                    &scope,
                    GateError::not_found("no content handler matched"),
                    Some(StatusCode::NOT_FOUND),
                    &mut on_error,
                );
                continue;
            }
            if matched.is_empty() {
                continue;
            }
            tracing::trace!(phase = %spec.phase, handlers = matched.len(), "running phase");

            match spec.policy {
                ConcurrencyPolicy::Sequential => {
                    self.run_sequential(&scope, spec, matched, &mut on_error).await;
                }
                ConcurrencyPolicy::FanOut => {
                    self.run_fan_out(&scope, spec, matched, &mut on_error).await;
                }
            }
        }

        rendered.unwrap_or_else(Rendered::fallback)
    }

    /// Collects the application entries followed by the request-scoped
    /// overlay entries for a phase, keeping only those whose pattern
    /// matches and binds.
    fn matched_entries(&self, scope: &Scope, phase: Phase) -> Vec<(RouteEntry, PathParams)> {
        let mut entries: Vec<RouteEntry> = self.table.entries(phase).to_vec();
        let line = {
            let ctx = scope.lock();
            entries.extend_from_slice(ctx.overlay().entries(phase));
            ctx.request_line()
        };
        entries
            .into_iter()
            .filter_map(|entry| bind_entry(&entry, &line).map(|params| (entry, params)))
            .collect()
    }

    async fn run_send_slot(
        &self,
        scope: &Scope,
        spec: &PhaseSpec,
        on_error: &mut bool,
        rendered: &mut Option<Rendered>,
    ) {
        if rendered.is_some() {
            // The response already went out before the run diverted
            // (an `after` handler failed); it cannot be replaced.
            tracing::warn!(phase = %spec.phase, "response already rendered, keeping it");
            return;
        }
        let slot = if spec.error_track {
            &self.send_error
        } else {
            &self.send
        };
        match slot.render(Arc::clone(scope)).await {
            Ok(response) => *rendered = Some(response),
            Err(err) if *on_error => {
                tracing::error!(error = %err, "error response serialization failed");
                *rendered = Some(Rendered::fallback());
            }
            Err(err) => {
                divert(scope, err, spec.default_error_status, on_error);
            }
        }
    }

    async fn run_sequential(
        &self,
        scope: &Scope,
        spec: &PhaseSpec,
        matched: Vec<(RouteEntry, PathParams)>,
        on_error: &mut bool,
    ) {
        for (entry, params) in matched {
            let args = {
                let mut ctx = scope.lock();
                ctx.set_path_params(params.clone());
                drop(ctx);
                resolve_args(scope, &entry.bindings, &params)
            };
            match entry.handler.call(Arc::clone(scope), args).await {
                Ok(Some(output)) if captures_output(spec.phase) => {
                    scope.lock().set_output(output);
                }
                Ok(_) => {}
                Err(err) => {
                    phase_failure(scope, spec, err, on_error);
                    break;
                }
            }
        }
    }

    async fn run_fan_out(
        &self,
        scope: &Scope,
        spec: &PhaseSpec,
        matched: Vec<(RouteEntry, PathParams)>,
        on_error: &mut bool,
    ) {
        let mut futures = Vec::with_capacity(matched.len());
        for (entry, params) in matched {
            let args = {
                let mut ctx = scope.lock();
                ctx.set_path_params(params.clone());
                drop(ctx);
                resolve_args(scope, &entry.bindings, &params)
            };
            futures.push(entry.handler.call(Arc::clone(scope), args));
        }
        let results = join_all(futures).await;
        // The first failure in registration order is carried forward.
        if let Some(err) = results.into_iter().find_map(Result::err) {
            phase_failure(scope, spec, err, on_error);
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

/// Phases whose handler return values become the staged output.
const fn captures_output(phase: Phase) -> bool {
    matches!(phase, Phase::Process | Phase::Error)
}

/// Handles a handler failure inside a phase.
///
/// On the normal track the run diverts; on the error track the failure is
/// logged and the walk continues, so the error response still goes out.
fn phase_failure(scope: &Scope, spec: &PhaseSpec, err: GateError, on_error: &mut bool) {
    if *on_error {
        tracing::warn!(phase = %spec.phase, error = %err, "error-track handler failed");
    } else {
        tracing::debug!(phase = %spec.phase, error = %err, "handler failed");
        divert(scope, err, spec.default_error_status, on_error);
    }
}

/// Diverts the run onto the error track.
///
/// The implied status applies only while the staged status is still in
/// the success range, so a status a handler raised explicitly survives.
fn divert(scope: &Scope, err: GateError, implied: Option<StatusCode>, on_error: &mut bool) {
    let mut ctx = scope.lock();
    if ctx.status().as_u16() < 300 {
        if let Some(status) = implied {
            ctx.set_status(status);
        }
    }
    ctx.set_error(err);
    *on_error = true;
}
