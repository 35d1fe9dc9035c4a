//! HTTP surface shared by every agent role.

mod routes;

pub use routes::AppState;

use crate::error::{CareError, CareResult};
use a2a_types::WELL_KNOWN_CARD_PATH;
use axum::routing::{get, post};
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> axum::Router {
    let cors = tower_http::cors::CorsLayer::permissive();

    axum::Router::new()
        .route("/", post(routes::rpc))
        .route(WELL_KNOWN_CARD_PATH, get(routes::agent_card))
        .route("/status", get(routes::status))
        .with_state(state)
        .layer(cors)
}

pub async fn serve(addr: &str, state: Arc<AppState>) -> CareResult<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CareError::Config(format!("failed to bind {}: {}", addr, e)))?;

    log::info!("{} listening on http://{}/", state.card.name, addr);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| CareError::transport(format!("server error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::OfflineReasoner;
    use crate::agents::AgentRole;
    use crate::connector::test_support::spawn;
    use crate::connector::AgentConnector;
    use crate::tasks::{TaskManager, TaskStore};
    use a2a_types::*;
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};

    async fn symptom_agent() -> String {
        let state = Arc::new(AppState {
            manager: TaskManager::new(
                "SymptomCheckerAgent",
                Arc::new(TaskStore::new()),
                Arc::new(OfflineReasoner::SymptomChecker),
                Duration::from_secs(5),
            ),
            card: AgentRole::SymptomChecker.card("http://127.0.0.1:10020/"),
            start_time: Instant::now(),
        });
        spawn(router(state)).await
    }

    async fn post_raw(url: &str, body: String) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(url)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_send_then_get_over_http() {
        let url = symptom_agent().await;
        let connector = AgentConnector::new("SymptomCheckerAgent", url.clone());

        let task = connector.send_task("I have a fever", "s1", None).await.unwrap();
        assert_eq!(task.state(), TaskState::Completed);
        assert_eq!(task.history.len(), 2);

        let fetched = connector.get_task(&task.id, Some(1)).await.unwrap();
        assert_eq!(fetched.history.len(), 1);
        assert_eq!(fetched.history[0].role, Role::Agent);

        let status: AgentStatus = reqwest::get(format!("{}status", url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status.agent, "SymptomCheckerAgent");
        assert_eq!(status.tasks, 1);
    }

    #[tokio::test]
    async fn test_unknown_task_is_200_with_error_body() {
        let url = symptom_agent().await;
        let (status, body) = post_raw(
            &url,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tasks/get", "params": {"id": "nope"}}).to_string(),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["id"], 3);
        assert_eq!(body["error"]["code"], TASK_NOT_FOUND);

        let err = AgentConnector::new("SymptomCheckerAgent", url)
            .get_task("nope", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CareError::Rpc(rpc) if rpc.code == TASK_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_protocol_errors_are_400() {
        let url = symptom_agent().await;

        let (status, body) = post_raw(&url, "{not json".to_string()).await;
        assert_eq!((status, body["error"]["code"].as_i64()), (400, Some(PARSE_ERROR)));

        let (status, body) = post_raw(
            &url,
            json!({"jsonrpc": "2.0", "id": "x", "method": "tasks/cancel", "params": {"id": "t1"}}).to_string(),
        )
        .await;
        assert_eq!((status, body["error"]["code"].as_i64()), (400, Some(METHOD_NOT_FOUND)));
        assert_eq!(body["id"], "x");

        let (status, body) = post_raw(
            &url,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tasks/send", "params": {"id": "t1"}}).to_string(),
        )
        .await;
        assert_eq!((status, body["error"]["code"].as_i64()), (400, Some(INVALID_PARAMS)));
    }

    #[tokio::test]
    async fn test_orchestrator_relays_specialist_reply() {
        use crate::ai::DelegationTools;
        use crate::connector::ConnectorCache;
        use crate::discovery::{AgentRegistry, NameMatch};
        use crate::routing::{KeywordRules, Router};

        let symptom_url = symptom_agent().await;
        let registry = AgentRegistry::from_cards(
            vec![AgentRole::SymptomChecker.card(&symptom_url)],
            NameMatch::Substring,
        )
        .unwrap();
        let delegation = Arc::new(DelegationTools::new(
            Arc::new(registry),
            Arc::new(ConnectorCache::new()),
        ));
        let routing = Router::keyword(
            KeywordRules::healthcare(Some("SymptomCheckerAgent".to_string())),
            delegation,
        );
        let state = Arc::new(AppState {
            manager: TaskManager::new(
                "OrchestratorAgent",
                Arc::new(TaskStore::new()),
                Arc::new(routing),
                Duration::from_secs(5),
            ),
            card: AgentRole::Orchestrator.card("http://127.0.0.1:10000/"),
            start_time: Instant::now(),
        });
        let orchestrator = AgentConnector::new("OrchestratorAgent", spawn(router(state)).await);

        let task = orchestrator.send_task("I have a fever", "s1", None).await.unwrap();
        assert_eq!(task.state(), TaskState::Completed);
        assert!(task.last_message().unwrap().text().contains("influenza"));
    }

    #[tokio::test]
    async fn test_serves_agent_card() {
        let url = symptom_agent().await;
        let card = AgentConnector::new("SymptomCheckerAgent", url).fetch_card().await.unwrap();
        assert_eq!(card.name, "SymptomCheckerAgent");
        assert_eq!(card.skills[0].id, "check_symptoms");
    }
}
