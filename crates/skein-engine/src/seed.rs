use skein_action::{Action, RouteId};
use skein_route::RouteRegistry;
use skein_store::ActionStore;
use tracing::info;

use crate::error::EngineError;

/// Insert one pending action per query for a registered route.
pub async fn seed_actions<I, Q>(
  store: &dyn ActionStore,
  routes: &RouteRegistry,
  route: &RouteId,
  queries: I,
  priority: Option<i64>,
) -> Result<Vec<Action>, EngineError>
where
  I: IntoIterator<Item = Q>,
  Q: Into<String>,
{
  let descriptor = routes
    .get(route)
    .ok_or_else(|| EngineError::UnknownRoute {
      route: route.clone(),
    })?
    .descriptor()
    .clone();
  let priority = priority.unwrap_or(descriptor.priority);

  let mut seeded = Vec::new();
  for query in queries {
    let action = Action::for_route(route, query).with_priority(priority);
    store.insert(&action).await?;
    info!(action_id = %action.id, route = %route, query = %action.query, priority, "seeded action");
    seeded.push(action);
  }
  Ok(seeded)
}
