use futures::future::{join_all, BoxFuture, FutureExt};
use std::collections::BTreeMap;

use crate::indicators::Contributor;
use crate::types::{CompositeHealth, HealthComponent, HealthStatus, IndicatorResult};

/// Merge statuses with `DOWN > OUT_OF_SERVICE > UNKNOWN > UP`. An empty set is UP.
pub fn merge_statuses<I>(statuses: I) -> HealthStatus
where
    I: IntoIterator<Item = HealthStatus>,
{
    statuses
        .into_iter()
        .fold(HealthStatus::Up, |merged, status| merged.merge(status))
}

pub fn evaluate(children: BTreeMap<String, HealthComponent>) -> CompositeHealth {
    let status = merge_statuses(children.values().map(HealthComponent::status));
    CompositeHealth {
        status,
        components: children,
    }
}

// Spawned child tasks outlive a dropped caller and finish on their own timeout.
pub fn evaluate_contributors(contributors: Vec<Contributor>) -> BoxFuture<'static, CompositeHealth> {
    async move {
        let (names, handles): (Vec<String>, Vec<_>) = contributors
            .into_iter()
            .map(|contributor| {
                let name = contributor.name().to_string();
                (name, tokio::spawn(evaluate_contributor(contributor)))
            })
            .unzip();

        let outcomes = join_all(handles).await;

        let mut children = BTreeMap::new();
        for (name, outcome) in names.into_iter().zip(outcomes) {
            let component = match outcome {
                Ok(component) => component,
                Err(e) => {
                    log::error!("indicator {} could not be evaluated: {}", name, e);
                    // Contributes UNKNOWN rather than disappearing from the composite.
                    HealthComponent::Indicator(
                        IndicatorResult::new(&name, HealthStatus::Unknown)
                            .with_detail("error", format!("indicator could not be evaluated: {}", e)),
                    )
                }
            };
            children.insert(name, component);
        }

        evaluate(children)
    }
    .boxed()
}

fn evaluate_contributor(contributor: Contributor) -> BoxFuture<'static, HealthComponent> {
    async move {
        match contributor {
            Contributor::Indicator(indicator) => {
                let mut result = indicator.evaluate().await;
                result.name = indicator.name().to_string();
                HealthComponent::Indicator(result)
            }
            Contributor::Composite { children, .. } => {
                HealthComponent::Composite(evaluate_contributors(children.to_vec()).await)
            }
        }
    }
    .boxed()
}
