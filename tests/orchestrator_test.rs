//! End-to-end tests for the game orchestrator: create/join/move intents,
//! PvE AI replies, disconnect forfeits and the autonomous AVA loop.

use side_stacker::db::GameRepository;
use side_stacker::protocol::{CreateGamePayload, JoinGamePayload, MakeMovePayload};
use side_stacker::{
    Board, ClientConnection, ConnectionRegistry, EntrySide, GameOrchestrator, GameStatus, Piece,
    ServerConfig, ServerMessage,
};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::mpsc::{self, UnboundedReceiver};

fn setup() -> (NamedTempFile, GameOrchestrator) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let repo = GameRepository::new(db_path).expect("Failed to create repository");
    repo.run_migrations().expect("Migrations failed");

    let config = ServerConfig::default()
        .with_ai_reply_delay_ms(0)
        .with_ava_pacing_ms(5);
    let orchestrator = GameOrchestrator::new(ConnectionRegistry::new(), repo, config);
    (db_file, orchestrator)
}

fn connection() -> (ClientConnection, UnboundedReceiver<ServerMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ClientConnection::new(tx), rx)
}

fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

fn side_str(side: EntrySide) -> &'static str {
    match side {
        EntrySide::Left => "L",
        EntrySide::Right => "R",
    }
}

fn pve_payload(player: &str, difficulty: &str) -> CreateGamePayload {
    CreateGamePayload {
        player_temp_id: Some(player.to_string()),
        mode: Some("PVE".to_string()),
        difficulty: Some(difficulty.to_string()),
        ..Default::default()
    }
}

fn pvp_payload(player: &str) -> CreateGamePayload {
    CreateGamePayload {
        player_temp_id: Some(player.to_string()),
        mode: Some("PVP".to_string()),
        ..Default::default()
    }
}

fn move_payload(token: &str, row: usize, side: EntrySide) -> MakeMovePayload {
    MakeMovePayload {
        player_token: Some(token.to_string()),
        row: Some(row as i64),
        side: Some(side_str(side).to_string()),
    }
}

#[tokio::test]
async fn test_pve_create_announces_seats_and_turn() {
    let (_db, orchestrator) = setup();
    let (conn, mut rx) = connection();

    orchestrator
        .create_game(&conn, "p1", pve_payload("p1", "EASY"))
        .expect("create failed");

    let messages = drain(&mut rx);
    match &messages[0] {
        ServerMessage::GameCreated {
            player_token,
            player_piece,
            game_mode,
            ..
        } => {
            assert_eq!(player_token, "p1");
            assert_eq!(*player_piece, Some(Piece::X));
            assert_eq!(game_mode, "PVE_EASY");
        }
        other => panic!("expected GAME_CREATED, got {other:?}"),
    }
    match &messages[1] {
        ServerMessage::GameStart {
            current_player_token,
            players,
            your_piece,
            your_token,
            ..
        } => {
            assert_eq!(current_player_token.as_deref(), Some("p1"));
            assert_eq!(players.get("p1"), Some(&Piece::X));
            let ai_token = players
                .keys()
                .find(|t| t.as_str() != "p1")
                .expect("AI seat missing");
            assert!(ai_token.starts_with("AI_EASY"));
            assert_eq!(players.get(ai_token), Some(&Piece::O));
            assert_eq!(*your_piece, Some(Piece::X));
            assert_eq!(your_token.as_deref(), Some("p1"));
        }
        other => panic!("expected GAME_START, got {other:?}"),
    }
}

#[tokio::test]
async fn test_pve_easy_game_reaches_game_over_within_board_capacity() {
    let (_db, orchestrator) = setup();
    let (conn, mut rx) = connection();

    let game_id = orchestrator
        .create_game(&conn, "p1", pve_payload("p1", "EASY"))
        .expect("create failed");

    let mut board = Board::new();
    for message in drain(&mut rx) {
        if let ServerMessage::GameStart { board: b, .. } = message {
            board = b;
        }
    }

    // A 7x7 board holds 49 placements; the game must terminate within
    // them. 25 human moves alternating with AI replies covers that.
    let mut game_over = None;
    'game: for _ in 0..25 {
        let mv = board
            .legal_moves()
            .into_iter()
            .next()
            .expect("no legal move while game still active");
        orchestrator
            .make_move(Some(&game_id), move_payload("p1", mv.row, mv.side))
            .await
            .expect("move rejected");

        for message in drain(&mut rx) {
            match message {
                ServerMessage::GameUpdate { board: b, .. } => board = b,
                ServerMessage::GameOver { .. } => {
                    game_over = Some(message);
                    break 'game;
                }
                _ => {}
            }
        }
    }

    let game_over = game_over.expect("no GAME_OVER within board capacity");
    let ServerMessage::GameOver {
        status,
        winner_token,
        ..
    } = game_over
    else {
        unreachable!()
    };
    assert!(matches!(
        status,
        GameStatus::XWins | GameStatus::OWins | GameStatus::Draw
    ));
    assert!(winner_token.is_some());

    let row = orchestrator
        .repository()
        .get_game(&game_id)
        .expect("load failed")
        .expect("game missing");
    assert!(row.current_player_token().is_none());
}

#[tokio::test]
async fn test_move_with_wrong_token_leaves_record_untouched_and_silent() {
    let (_db, orchestrator) = setup();
    let (conn, mut rx) = connection();

    let game_id = orchestrator
        .create_game(&conn, "p1", pve_payload("p1", "MEDIUM"))
        .expect("create failed");
    drain(&mut rx);

    let before = orchestrator
        .repository()
        .get_game(&game_id)
        .expect("load failed")
        .expect("game missing");

    let fault = orchestrator
        .make_move(Some(&game_id), move_payload("intruder", 0, EntrySide::Left))
        .await
        .expect_err("out-of-turn move must be rejected");
    assert_eq!(fault.message, "Not your turn.");

    let after = orchestrator
        .repository()
        .get_game(&game_id)
        .expect("load failed")
        .expect("game missing");
    assert_eq!(before.board_state(), after.board_state());
    assert_eq!(before.status(), after.status());
    assert_eq!(before.current_player_token(), after.current_player_token());
    assert!(
        drain(&mut rx).is_empty(),
        "rejected move must not broadcast to the room"
    );
}

#[tokio::test]
async fn test_invalid_board_move_rejected() {
    let (_db, orchestrator) = setup();
    let (conn, mut rx) = connection();

    let game_id = orchestrator
        .create_game(&conn, "p1", pve_payload("p1", "EASY"))
        .expect("create failed");
    drain(&mut rx);

    let fault = orchestrator
        .make_move(Some(&game_id), move_payload("p1", 42, EntrySide::Left))
        .await
        .expect_err("out-of-range row must be rejected");
    assert_eq!(fault.message, "Invalid move on board.");
}

#[tokio::test]
async fn test_move_without_room_rejected() {
    let (_db, orchestrator) = setup();

    let fault = orchestrator
        .make_move(None, move_payload("p1", 0, EntrySide::Left))
        .await
        .expect_err("move without a room must be rejected");
    assert_eq!(fault.message, "No active game. Create or join first.");
}

#[tokio::test]
async fn test_pvp_join_starts_game_and_alternates_turns() {
    let (_db, orchestrator) = setup();
    let (c1, mut rx1) = connection();
    let (c2, mut rx2) = connection();

    let game_id = orchestrator
        .create_game(&c1, "p1", pvp_payload("p1"))
        .expect("create failed");
    let created = drain(&mut rx1);
    assert!(matches!(created[0], ServerMessage::GameCreated { .. }));
    assert!(matches!(created[1], ServerMessage::WaitingForPlayer { .. }));

    orchestrator
        .join_game(
            &c2,
            "p2",
            JoinGamePayload {
                game_id: Some(game_id.clone()),
                player_temp_id: Some("p2".to_string()),
            },
        )
        .expect("join failed");

    // Creator gets a personalized GAME_START; joiner gets GAME_JOINED
    // then their own GAME_START.
    let p1_messages = drain(&mut rx1);
    assert!(p1_messages.iter().any(|m| matches!(
        m,
        ServerMessage::GameStart { your_piece: Some(Piece::X), .. }
    )));
    let p2_messages = drain(&mut rx2);
    assert!(matches!(p2_messages[0], ServerMessage::GameJoined { .. }));
    assert!(p2_messages.iter().any(|m| matches!(
        m,
        ServerMessage::GameStart { your_piece: Some(Piece::O), .. }
    )));

    orchestrator
        .make_move(Some(&game_id), move_payload("p1", 0, EntrySide::Left))
        .await
        .expect("p1 move rejected");
    let row = orchestrator
        .repository()
        .get_game(&game_id)
        .expect("load failed")
        .expect("game missing");
    assert_eq!(row.current_player_token().as_deref(), Some("p2"));

    orchestrator
        .make_move(Some(&game_id), move_payload("p2", 0, EntrySide::Right))
        .await
        .expect("p2 move rejected");
    let row = orchestrator
        .repository()
        .get_game(&game_id)
        .expect("load failed")
        .expect("game missing");
    assert_eq!(row.current_player_token().as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_join_rejections() {
    let (_db, orchestrator) = setup();
    let (c1, _rx1) = connection();
    let (c2, _rx2) = connection();

    let game_id = orchestrator
        .create_game(&c1, "p1", pvp_payload("p1"))
        .expect("create failed");

    let fault = orchestrator
        .join_game(
            &c2,
            "p1",
            JoinGamePayload {
                game_id: Some(game_id.clone()),
                player_temp_id: Some("p1".to_string()),
            },
        )
        .expect_err("joining own game must fail");
    assert_eq!(fault.message, "You cannot join a game you created as Player 2.");

    let fault = orchestrator
        .join_game(
            &c2,
            "p2",
            JoinGamePayload {
                game_id: Some("66666666-6666-6666-6666-666666666666".to_string()),
                player_temp_id: Some("p2".to_string()),
            },
        )
        .expect_err("joining unknown game must fail");
    assert_eq!(fault.message, "Game not found to join.");

    let fault = orchestrator
        .join_game(
            &c2,
            "p2",
            JoinGamePayload {
                game_id: Some("not-a-uuid".to_string()),
                player_temp_id: Some("p2".to_string()),
            },
        )
        .expect_err("malformed id must fail");
    assert_eq!(fault.message, "Invalid game_id format for JOIN_GAME.");

    // A game abandoned by its creator is no longer joinable.
    orchestrator.connection_closed(c1.id()).await;
    let fault = orchestrator
        .join_game(
            &c2,
            "p2",
            JoinGamePayload {
                game_id: Some(game_id.clone()),
                player_temp_id: Some("p2".to_string()),
            },
        )
        .expect_err("joining a terminal game must fail");
    assert_eq!(fault.message, "This game can no longer be joined.");
}

#[tokio::test]
async fn test_disconnect_forfeits_active_pvp_game_idempotently() {
    let (_db, orchestrator) = setup();
    let (c1, mut rx1) = connection();
    let (c2, mut rx2) = connection();

    let game_id = orchestrator
        .create_game(&c1, "p1", pvp_payload("p1"))
        .expect("create failed");
    orchestrator
        .join_game(
            &c2,
            "p2",
            JoinGamePayload {
                game_id: Some(game_id.clone()),
                player_temp_id: Some("p2".to_string()),
            },
        )
        .expect("join failed");
    drain(&mut rx1);
    drain(&mut rx2);

    orchestrator.connection_closed(c1.id()).await;

    let over = drain(&mut rx2)
        .into_iter()
        .find_map(|m| match m {
            ServerMessage::GameOver {
                status,
                winner_token,
                winning_player_piece,
                reason,
                ..
            } => Some((status, winner_token, winning_player_piece, reason)),
            _ => None,
        })
        .expect("no GAME_OVER after forfeit");
    assert_eq!(over.0, GameStatus::OWins);
    assert_eq!(over.1.as_deref(), Some("p2"));
    assert_eq!(over.2, Some(Piece::O));
    assert_eq!(over.3.as_deref(), Some("opponent_disconnected"));

    let row = orchestrator
        .repository()
        .get_game(&game_id)
        .expect("load failed")
        .expect("game missing");
    assert_eq!(row.status(), "player_o_wins");
    assert_eq!(row.winner_token().as_deref(), Some("p2"));

    // Repeating the disconnect is a no-op.
    orchestrator.connection_closed(c1.id()).await;
    assert!(drain(&mut rx2).is_empty());
    let row_after = orchestrator
        .repository()
        .get_game(&game_id)
        .expect("load failed")
        .expect("game missing");
    assert_eq!(row.status(), row_after.status());
    assert_eq!(row.winner_token(), row_after.winner_token());
}

#[tokio::test]
async fn test_disconnect_before_opponent_joins_abandons_game() {
    let (_db, orchestrator) = setup();
    let (c1, _rx1) = connection();

    let game_id = orchestrator
        .create_game(&c1, "p1", pvp_payload("p1"))
        .expect("create failed");
    orchestrator.connection_closed(c1.id()).await;

    let row = orchestrator
        .repository()
        .get_game(&game_id)
        .expect("load failed")
        .expect("game missing");
    assert_eq!(row.status(), "abandoned");
    assert!(row.winner_token().is_none());
    assert!(row.current_player_token().is_none());
}

#[tokio::test]
async fn test_pve_disconnect_records_stats_for_linked_account() {
    let (_db, orchestrator) = setup();
    let user = orchestrator
        .repository()
        .create_user("p1".to_string())
        .expect("create user failed");

    let (conn, _rx) = connection();
    orchestrator
        .create_game(&conn, "p1", pve_payload("p1", "EASY"))
        .expect("create failed");
    orchestrator.connection_closed(conn.id()).await;

    let stats = orchestrator
        .repository()
        .get_stats(*user.id())
        .expect("stats failed")
        .expect("stats row missing");
    assert_eq!(*stats.abandoned(), 1);
    assert_eq!(*stats.losses(), 1);
    assert_eq!(*stats.games_played(), 1);
}

#[tokio::test]
async fn test_invalid_difficulty_rejected() {
    let (_db, orchestrator) = setup();
    let (conn, _rx) = connection();

    let fault = orchestrator
        .create_game(&conn, "p1", pve_payload("p1", "IMPOSSIBLE"))
        .expect_err("bad difficulty must fail");
    assert_eq!(fault.message, "Invalid AI difficulty for PVE.");

    let fault = orchestrator
        .create_game(
            &conn,
            "p1",
            CreateGamePayload {
                player_temp_id: Some("p1".to_string()),
                mode: Some("CHESS".to_string()),
                ..Default::default()
            },
        )
        .expect_err("unknown mode must fail");
    assert_eq!(fault.message, "Unsupported game mode: CHESS");
}

#[tokio::test]
async fn test_spectator_cannot_move_in_ava_game() {
    let (_db, orchestrator) = setup();
    let (conn, mut rx) = connection();

    let game_id = orchestrator
        .create_game(
            &conn,
            "spec1",
            CreateGamePayload {
                player_temp_id: Some("spec1".to_string()),
                mode: Some("AVA".to_string()),
                ai1_difficulty: Some("EASY".to_string()),
                ai2_difficulty: Some("EASY".to_string()),
                ..Default::default()
            },
        )
        .expect("create failed");
    drain(&mut rx);

    let fault = orchestrator
        .make_move(Some(&game_id), move_payload("spec1", 0, EntrySide::Left))
        .await
        .expect_err("spectator move must be rejected");
    assert_eq!(
        fault.message,
        "Spectators cannot make moves in AI vs AI games."
    );
    orchestrator.shutdown();
}

#[tokio::test]
async fn test_ava_game_runs_unattended_to_completion() {
    let (_db, orchestrator) = setup();
    let (conn, mut rx) = connection();

    let game_id = orchestrator
        .create_game(
            &conn,
            "spec1",
            CreateGamePayload {
                player_temp_id: Some("spec1".to_string()),
                mode: Some("AVA".to_string()),
                ai1_difficulty: Some("EASY".to_string()),
                ai2_difficulty: Some("MEDIUM".to_string()),
                ..Default::default()
            },
        )
        .expect("create failed");

    let created = rx.recv().await.expect("missing GAME_CREATED");
    match created {
        ServerMessage::GameCreated {
            player_token,
            player_piece,
            ..
        } => {
            assert_eq!(player_token, "SPECTATOR");
            assert_eq!(player_piece, None);
        }
        other => panic!("expected GAME_CREATED, got {other:?}"),
    }

    let game_over = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match rx.recv().await {
                Some(ServerMessage::GameOver { status, .. }) => break status,
                Some(_) => {}
                None => panic!("spectator stream closed before GAME_OVER"),
            }
        }
    })
    .await
    .expect("AVA game did not finish in time");

    assert!(game_over.is_terminal());
    let row = orchestrator
        .repository()
        .get_game(&game_id)
        .expect("load failed")
        .expect("game missing");
    assert!(row.current_player_token().is_none());
    assert_ne!(row.status(), "active");
}
