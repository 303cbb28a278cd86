//! Serving loop: accepts connections and dispatches calls to the service.

use crate::frame::{Envelope, Request, Response};
use crate::listener::{ConnectionId, InMemoryListener};
use costsource_types::{CallResult, CostSource, Status};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Run until `shutdown` flips or every dialer is gone.
pub(crate) async fn serve(
    service: Arc<dyn CostSource>,
    mut listener: InMemoryListener,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Some((id, frames)) => {
                    tracing::debug!(connection = id, "Accepted in-memory connection");
                    connections.spawn(serve_connection(
                        id,
                        service.clone(),
                        frames,
                        shutdown.clone(),
                    ));
                }
                None => break,
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    // Dropping the set aborts connections and every call still in flight.
    connections.shutdown().await;
    tracing::debug!("Serving loop stopped");
}

async fn serve_connection(
    id: ConnectionId,
    service: Arc<dyn CostSource>,
    mut frames: mpsc::Receiver<Envelope>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut calls = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            frame = frames.recv() => match frame {
                Some(envelope) => {
                    calls.spawn(handle_call(service.clone(), envelope));
                }
                None => break,
            },
            Some(_) = calls.join_next(), if !calls.is_empty() => {}
        }
    }

    // Client hung up: let calls already accepted finish and answer.
    if !*shutdown.borrow() {
        while calls.join_next().await.is_some() {}
    }
    tracing::debug!(connection = id, "Connection closed");
}

async fn handle_call(service: Arc<dyn CostSource>, envelope: Envelope) {
    let Envelope {
        request,
        deadline,
        mut reply,
    } = envelope;
    let method = request.method();
    let started = Instant::now();

    let call = AssertUnwindSafe(dispatch(service.as_ref(), request)).catch_unwind();

    let result = tokio::select! {
        outcome = call => match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(%method, "Service handler panicked");
                Err(Status::internal(format!("handler for {} panicked", method)))
            }
        },
        _ = tokio::time::sleep_until(deadline) => {
            Err(Status::deadline_exceeded(format!(
                "{} did not complete before its deadline",
                method
            )))
        }
        // Caller gave up; nobody is listening for the answer.
        _ = reply.closed() => return,
    };

    tracing::trace!(%method, elapsed = ?started.elapsed(), ok = result.is_ok(), "Served call");
    let _ = reply.send(result);
}

async fn dispatch(service: &dyn CostSource, request: Request) -> CallResult<Response> {
    Ok(match request {
        Request::Name => Response::Name(service.name().await?),
        Request::Supports(req) => Response::Supports(service.supports(req).await?),
        Request::ProjectedCost(req) => {
            Response::ProjectedCost(service.get_projected_cost(req).await?)
        }
        Request::ActualCost(req) => Response::ActualCost(service.get_actual_cost(req).await?),
        Request::PricingSpec(req) => Response::PricingSpec(service.get_pricing_spec(req).await?),
        Request::EstimateCost(req) => Response::EstimateCost(service.estimate_cost(req).await?),
        Request::Recommendations(req) => {
            Response::Recommendations(service.get_recommendations(req).await?)
        }
        Request::Budgets(req) => Response::Budgets(service.get_budgets(req).await?),
        Request::DryRun(req) => Response::DryRun(service.dry_run(req).await?),
    })
}
