use std::collections::HashSet;
use std::sync::Arc;

use ridedesk_core::{
    Agent, AgentStatus, ChatCoordinator, ChatEventKind, CoordinatorSettings, ErrorKind,
    MemorySnapshotStore, MessageSender, RidedeskError, SessionFilter, SessionStatus, UserType,
};

fn agent(id: &str, user_type: UserType, max_chats: u32) -> Agent {
    Agent::new(id, id, format!("{}@ridedesk.test", id), user_type, max_chats)
}

fn coordinator(agents: Vec<Agent>) -> Arc<ChatCoordinator> {
    Arc::new(ChatCoordinator::new(
        agents,
        Arc::new(MemorySnapshotStore::new()),
    ))
}

async fn assert_invariants(coord: &ChatCoordinator) {
    let agents = coord.list_agents().await;
    let sessions = coord.list_sessions(&SessionFilter::new()).await;

    for agent in &agents {
        assert!(
            agent.active_chats <= agent.max_chats,
            "agent {} over capacity",
            agent.id
        );
        assert_eq!(
            agent.status == AgentStatus::Busy,
            agent.active_chats == agent.max_chats,
            "agent {} status out of sync",
            agent.id
        );

        let connected = sessions
            .iter()
            .filter(|s| s.is_connected() && s.agent_id.as_deref() == Some(agent.id.as_str()))
            .count() as u32;
        assert_eq!(connected, agent.active_chats, "agent {} count drift", agent.id);
    }

    for session in &sessions {
        assert!(session.last_message_consistent());
        match session.status {
            SessionStatus::Waiting => assert!(session.agent_id.is_none()),
            SessionStatus::Connected => {
                let agent_id = session.agent_id.as_deref().unwrap();
                let agent = agents.iter().find(|a| a.id == agent_id).unwrap();
                assert_eq!(agent.user_type, session.user_type);
            }
            SessionStatus::Closed => {}
        }
    }
}

mod assignment_tests {
    use super::*;

    #[tokio::test]
    async fn test_single_rider_agent_scenario() {
        let coord = coordinator(vec![agent("rider-1", UserType::Rider, 1)]);

        let s1 = coord
            .create_session("u-1", "Rita", UserType::Rider, Some("my driver cancelled"))
            .await;
        assert_eq!(s1.status, SessionStatus::Connected);
        assert_eq!(s1.agent_id.as_deref(), Some("rider-1"));

        let a = coord.get_agent("rider-1").await.unwrap();
        assert_eq!(a.active_chats, 1);
        assert_eq!(a.status, AgentStatus::Busy);

        let s2 = coord
            .create_session("u-2", "Omar", UserType::Rider, None)
            .await;
        assert_eq!(s2.status, SessionStatus::Waiting);
        assert!(s2.agent_id.is_none());

        coord.close_session(&s1.id).await.unwrap();

        let a = coord.get_agent("rider-1").await.unwrap();
        assert_eq!(a.active_chats, 0);
        assert_eq!(a.status, AgentStatus::Available);
        assert_eq!(
            coord.get_session(&s2.id).await.unwrap().status,
            SessionStatus::Waiting
        );

        assert_invariants(&coord).await;
    }

    #[tokio::test]
    async fn test_capacity_limits_connected_sessions() {
        let coord = coordinator(vec![
            agent("rider-1", UserType::Rider, 2),
            agent("driver-1", UserType::Driver, 3),
            agent("rider-2", UserType::Rider, 1),
        ]);

        for i in 0..5 {
            coord
                .create_session(&format!("u-{}", i), "Rider", UserType::Rider, None)
                .await;
        }

        let connected = coord
            .list_sessions(&SessionFilter::new().with_status(SessionStatus::Connected))
            .await;
        let waiting = coord
            .list_sessions(&SessionFilter::new().with_status(SessionStatus::Waiting))
            .await;

        assert_eq!(connected.len(), 3);
        assert_eq!(waiting.len(), 2);
        assert!(connected
            .iter()
            .all(|s| s.agent_id.as_deref() != Some("driver-1")));

        let driver = coord.get_agent("driver-1").await.unwrap();
        assert_eq!(driver.active_chats, 0);

        assert_invariants(&coord).await;
    }

    #[tokio::test]
    async fn test_assignment_is_deterministic() {
        let roster = || {
            vec![
                agent("a", UserType::Driver, 1),
                agent("b", UserType::Driver, 2),
                agent("c", UserType::Rider, 1),
            ]
        };

        let mut runs = Vec::new();
        for _ in 0..2 {
            let coord = coordinator(roster());
            let mut picks = Vec::new();
            for user_type in [
                UserType::Driver,
                UserType::Rider,
                UserType::Driver,
                UserType::Driver,
                UserType::Driver,
            ] {
                let s = coord.create_session("u", "U", user_type, None).await;
                picks.push(s.agent_id);
            }
            runs.push(picks);
        }

        assert_eq!(runs[0], runs[1]);
        assert_eq!(
            runs[0],
            vec![
                Some("a".to_string()),
                Some("c".to_string()),
                Some("b".to_string()),
                Some("b".to_string()),
                None,
            ]
        );
    }

    #[tokio::test]
    async fn test_sweep_after_close_picks_up_waiting_session() {
        let coord = coordinator(vec![agent("driver-1", UserType::Driver, 1)]);

        let s1 = coord
            .create_session("u-1", "Dee", UserType::Driver, None)
            .await;
        let s2 = coord
            .create_session("u-2", "Eli", UserType::Driver, None)
            .await;
        assert!(s2.is_waiting());

        coord.close_session(&s1.id).await.unwrap();
        assert_eq!(coord.sweep_waiting().await, 1);

        let s2 = coord.get_session(&s2.id).await.unwrap();
        assert_eq!(s2.agent_id.as_deref(), Some("driver-1"));
        assert!(s2.assigned_at.is_some());

        assert_invariants(&coord).await;
    }

    #[tokio::test]
    async fn test_concurrent_creates_respect_capacity() {
        let coord = coordinator(vec![
            agent("rider-1", UserType::Rider, 3),
            agent("rider-2", UserType::Rider, 2),
        ]);

        let mut handles = Vec::new();
        for i in 0..20 {
            let coord = coord.clone();
            handles.push(tokio::spawn(async move {
                coord
                    .create_session(&format!("u-{}", i), "Rider", UserType::Rider, Some("hi"))
                    .await
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().id);
        }
        assert_eq!(ids.len(), 20);

        let stats = coord.stats().await;
        assert_eq!(stats.total, 20);
        assert_eq!(stats.connected, 5);
        assert_eq!(stats.waiting, 15);
        assert_eq!(stats.open_capacity, 0);
        assert_eq!(coord.revision().await, 20);

        assert_invariants(&coord).await;
    }
}

mod messaging_tests {
    use super::*;

    #[tokio::test]
    async fn test_message_errors() {
        let coord = coordinator(vec![agent("rider-1", UserType::Rider, 1)]);
        let s1 = coord
            .create_session("u-1", "Rita", UserType::Rider, None)
            .await;

        let err = coord
            .send_message(&s1.id, "", MessageSender::User)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = coord
            .send_message("nonexistent", "hi", MessageSender::User)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(err, RidedeskError::SessionNotFound(_)));

        assert!(coord.get_session(&s1.id).await.unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_conversation_keeps_tail_cache() {
        let coord = coordinator(vec![agent("driver-1", UserType::Driver, 2)]);
        let s = coord
            .create_session("u-1", "Dee", UserType::Driver, Some("payout missing"))
            .await;

        coord
            .send_message(&s.id, "Checking now", MessageSender::Agent)
            .await
            .unwrap();
        let last = coord
            .send_message(&s.id, "  thanks  ", MessageSender::User)
            .await
            .unwrap();

        let s = coord.get_session(&s.id).await.unwrap();
        let ids: Vec<u64> = s.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(last.text, "thanks");
        assert_eq!(s.last_message.as_deref(), Some("thanks"));
        assert_eq!(s.last_message_time, Some(last.timestamp));
        assert_eq!(s.messages[1].sender, MessageSender::Agent);
    }

    #[tokio::test]
    async fn test_waiting_session_accepts_messages() {
        let coord = coordinator(Vec::new());
        let s = coord
            .create_session("u-1", "Rita", UserType::Rider, None)
            .await;

        coord
            .send_message(&s.id, "anyone there?", MessageSender::User)
            .await
            .unwrap();

        let s = coord.get_session(&s.id).await.unwrap();
        assert!(s.is_waiting());
        assert_eq!(s.messages.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_keep_transcript_ordered() {
        const SENDS: u64 = 50;

        let coord = coordinator(vec![agent("rider-1", UserType::Rider, 1)]);
        let s = coord
            .create_session("u-1", "Rita", UserType::Rider, None)
            .await;

        let mut handles = Vec::new();
        for i in 0..SENDS {
            let coord = coord.clone();
            let session_id = s.id.clone();
            let sender = if i % 2 == 0 {
                MessageSender::User
            } else {
                MessageSender::Agent
            };
            handles.push(tokio::spawn(async move {
                coord
                    .send_message(&session_id, &format!("message {}", i), sender)
                    .await
            }));
        }

        let mut returned = HashSet::new();
        for handle in handles {
            returned.insert(handle.await.unwrap().unwrap().id);
        }
        assert_eq!(returned.len() as u64, SENDS);

        let s = coord.get_session(&s.id).await.unwrap();
        assert_eq!(s.messages.len() as u64, SENDS);
        let ids: Vec<u64> = s.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, (1..=SENDS).collect::<Vec<_>>());
        assert!(s.last_message_consistent());
        assert_eq!(coord.revision().await, SENDS + 1);

        assert_invariants(&coord).await;
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let coord = coordinator(vec![agent("rider-1", UserType::Rider, 2)]);
        let s = coord
            .create_session("u-1", "Rita", UserType::Rider, None)
            .await;

        coord.close_session(&s.id).await.unwrap();
        let closed = coord.get_session(&s.id).await.unwrap();
        let revision = coord.revision().await;

        coord.close_session(&s.id).await.unwrap();

        assert_eq!(coord.get_session(&s.id).await.unwrap(), closed);
        assert_eq!(coord.revision().await, revision);
        assert_eq!(coord.get_agent("rider-1").await.unwrap().active_chats, 0);
        assert!(closed.closed_at.is_some());
    }

    #[tokio::test]
    async fn test_close_unknown_session() {
        let coord = coordinator(Vec::new());
        let err = coord.close_session("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_sweep_on_close_setting() {
        let settings = CoordinatorSettings {
            sweep_on_close: true,
            ..CoordinatorSettings::default()
        };
        let coord = ChatCoordinator::with_settings(
            vec![agent("rider-1", UserType::Rider, 1)],
            Arc::new(MemorySnapshotStore::new()),
            settings,
        );

        let s1 = coord.create_session("u-1", "A", UserType::Rider, None).await;
        let s2 = coord.create_session("u-2", "B", UserType::Rider, None).await;

        coord.close_session(&s1.id).await.unwrap();

        let s2 = coord.get_session(&s2.id).await.unwrap();
        assert!(s2.is_connected());
        assert_eq!(coord.get_agent("rider-1").await.unwrap().active_chats, 1);
        assert_invariants(&coord).await;
    }

    #[tokio::test]
    async fn test_events_from_one_mutation_share_its_revision() {
        let settings = CoordinatorSettings {
            sweep_on_close: true,
            ..CoordinatorSettings::default()
        };
        let coord = ChatCoordinator::with_settings(
            vec![agent("rider-1", UserType::Rider, 1)],
            Arc::new(MemorySnapshotStore::new()),
            settings,
        );
        let mut rx = coord.subscribe();

        let s1 = coord.create_session("u-1", "A", UserType::Rider, None).await;
        let s2 = coord.create_session("u-2", "B", UserType::Rider, None).await;
        coord
            .send_message(&s1.id, "hello", MessageSender::User)
            .await
            .unwrap();
        coord.close_session(&s1.id).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push((event.revision, event.kind.name(), event.kind.session_id().to_string()));
        }

        assert_eq!(
            seen,
            vec![
                (1, "session_created", s1.id.clone()),
                (1, "session_assigned", s1.id.clone()),
                (2, "session_created", s2.id.clone()),
                (3, "message_sent", s1.id.clone()),
                (4, "session_closed", s1.id.clone()),
                (4, "session_assigned", s2.id.clone()),
            ]
        );
        assert_eq!(coord.revision().await, 4);
    }

    #[tokio::test]
    async fn test_events_follow_mutations() {
        let coord = coordinator(vec![agent("rider-1", UserType::Rider, 1)]);
        let mut rx = coord.subscribe();

        let s = coord.create_session("u-1", "A", UserType::Rider, None).await;
        coord
            .send_message(&s.id, "hello", MessageSender::User)
            .await
            .unwrap();
        coord.close_session(&s.id).await.unwrap();

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.kind.session_id(), s.id);
            if let ChatEventKind::SessionClosed { released_agent, .. } = &event.kind {
                assert_eq!(released_agent.as_deref(), Some("rider-1"));
            }
            names.push(event.kind.name());
        }

        assert_eq!(
            names,
            vec![
                "session_created",
                "session_assigned",
                "message_sent",
                "session_closed"
            ]
        );
    }

    #[tokio::test]
    async fn test_available_agent_lookup() {
        let coord = coordinator(vec![
            agent("rider-1", UserType::Rider, 1),
            agent("driver-1", UserType::Driver, 1),
        ]);

        assert_eq!(
            coord
                .get_available_agent(UserType::Driver)
                .await
                .map(|a| a.id),
            Some("driver-1".to_string())
        );

        coord.create_session("u", "D", UserType::Driver, None).await;
        assert!(coord.get_available_agent(UserType::Driver).await.is_none());
        assert!(coord.get_available_agent(UserType::Rider).await.is_some());
    }
}
