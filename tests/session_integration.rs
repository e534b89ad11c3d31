//! Chat session integration tests
//!
//! End-to-end tests driving `ChatSession` against the in-memory transport
//! and a recording surface. Covers context arming, payload composition,
//! streaming render order, failure fold-in, busy gating, chat switching,
//! session files, and preference persistence.

use a3s_chat::session_file::SessionFileView;
use a3s_chat::{
    AttachmentKind, CatalogEntry, ChatError, ChatId, ChatSession, Command, EngineConfig,
    FilePreferenceStore, HistoryMessage, MemoryPreferenceStore, MemorySurface, MemoryTransport,
    NoticeLevel, Plugin, PreferenceStore, Role, ScriptedReply, StreamState, SurfaceUpdate,
};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;

fn entry(id: i64, filename: &str, has_summary: bool) -> CatalogEntry {
    CatalogEntry {
        id,
        filename: filename.to_string(),
        mime_type: "application/pdf".to_string(),
        has_summary,
        uploaded_at: Utc::now(),
    }
}

struct Harness {
    transport: Arc<MemoryTransport>,
    surface: Arc<MemorySurface>,
    prefs: Arc<MemoryPreferenceStore>,
    session: Arc<ChatSession>,
}

async fn harness() -> Harness {
    let transport = Arc::new(
        MemoryTransport::new()
            .with_files(vec![
                entry(1, "report.pdf", true),
                entry(2, "notes.txt", false),
            ])
            .with_calendar("Mon 09:00 Standup"),
    );
    let surface = Arc::new(MemorySurface::new());
    let prefs = Arc::new(MemoryPreferenceStore::default());
    let session = ChatSession::new(
        transport.clone(),
        surface.clone(),
        prefs.clone(),
        EngineConfig::default(),
    )
    .unwrap();
    session.open_chat(ChatId::new("chat-1")).await.unwrap();
    session.refresh_catalog().await.unwrap();
    surface.clear();

    Harness {
        transport,
        surface,
        prefs,
        session: Arc::new(session),
    }
}

/// What the streaming slot showed after each append
fn slot_texts(surface: &MemorySurface) -> Vec<String> {
    let mut shown = String::new();
    surface
        .updates()
        .into_iter()
        .filter_map(|u| match u {
            SurfaceUpdate::AppendSlot { text, .. } => {
                shown.push_str(&text);
                Some(shown.clone())
            }
            SurfaceUpdate::OpenSlot { .. } => {
                shown.clear();
                None
            }
            _ => None,
        })
        .collect()
}

fn finalized(surface: &MemorySurface) -> Vec<(String, bool)> {
    surface
        .updates()
        .into_iter()
        .filter_map(|u| match u {
            SurfaceUpdate::FinalizeSlot { markup, failed, .. } => Some((markup, failed)),
            _ => None,
        })
        .collect()
}

async fn wait_until_busy(h: &Harness) {
    while !h.session.controls().await.busy {
        tokio::task::yield_now().await;
    }
}

// ─── Streaming ───────────────────────────────────────────────────

#[tokio::test]
async fn test_streaming_reply_renders_in_order() {
    let h = harness().await;
    h.transport
        .push_reply(ScriptedReply::chunks(["Hel", "lo, ", "world"]));

    h.session.send("Greet me").await.unwrap();

    let texts = slot_texts(&h.surface);
    assert_eq!(texts, vec!["Hel", "Hello, ", "Hello, world"]);
    for pair in texts.windows(2) {
        assert!(pair[1].starts_with(&pair[0]));
    }
    assert_eq!(
        finalized(&h.surface),
        vec![("<p>Hello, world</p>\n".to_string(), false)]
    );

    let transcript = h.session.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[1].raw, "Hello, world");
    assert_eq!(transcript[1].state, StreamState::Finalized);
}

#[tokio::test]
async fn test_update_sequence_shape() {
    let h = harness().await;
    h.transport.push_reply(ScriptedReply::chunks(["a", "b"]));
    h.session.send("x").await.unwrap();

    let kinds: Vec<&str> = h
        .surface
        .updates()
        .iter()
        .filter_map(|u| match u {
            SurfaceUpdate::AppendMessage { .. } => Some("append"),
            SurfaceUpdate::Pending { .. } => Some("pending"),
            SurfaceUpdate::OpenSlot { .. } => Some("open"),
            SurfaceUpdate::AppendSlot { .. } => Some("append_slot"),
            SurfaceUpdate::FinalizeSlot { .. } => Some("finalize"),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["append", "pending", "open", "append_slot", "append_slot", "finalize"]
    );
}

#[tokio::test]
async fn test_streamed_markup_is_escaped_until_finalized() {
    let h = harness().await;
    h.transport
        .push_reply(ScriptedReply::chunks(["**bold** <b>", "x</b>"]));
    h.session.send("x").await.unwrap();

    let texts = slot_texts(&h.surface);
    assert_eq!(texts[0], "**bold** &lt;b&gt;");
    let (markup, _) = &finalized(&h.surface)[0];
    assert!(markup.contains("<strong>bold</strong>"));
}

#[tokio::test]
async fn test_multibyte_split_across_chunks() {
    let h = harness().await;
    let (tx, reply) = ScriptedReply::channel(8);
    h.transport.push_reply(reply);

    let bytes = "café".as_bytes();
    tx.send(Ok(Bytes::copy_from_slice(&bytes[..4]))).await.unwrap();
    tx.send(Ok(Bytes::copy_from_slice(&bytes[4..]))).await.unwrap();
    drop(tx);

    h.session.send("x").await.unwrap();
    assert_eq!(slot_texts(&h.surface), vec!["caf", "café"]);
}

#[tokio::test]
async fn test_complete_reply_when_streaming_disabled() {
    let h = harness().await;
    h.session.dispatch(Command::SetStreaming(false)).await;
    h.transport
        .push_reply(ScriptedReply::Complete("*done*".to_string()));

    h.session.send("Go").await.unwrap();

    let sent = h.transport.sent();
    assert!(!sent[0].1.enable_streaming);
    assert!(slot_texts(&h.surface).is_empty());
    assert_eq!(
        finalized(&h.surface),
        vec![("<p><em>done</em></p>\n".to_string(), false)]
    );
    assert_eq!(
        h.prefs.get("chat.streaming").unwrap(),
        Some(serde_json::json!(false))
    );
}

// ─── Failures ────────────────────────────────────────────────────

#[tokio::test]
async fn test_stream_failure_keeps_partial_text() {
    let h = harness().await;
    h.transport.push_reply(ScriptedReply::Chunks(vec![
        Ok("Partial answ".to_string()),
        Err("connection reset".to_string()),
    ]));

    let err = h.session.send("Tell me").await.unwrap_err();
    assert!(matches!(err, ChatError::StreamRead(_)));

    let expected = format!("<p>Partial answ[Error: {}]</p>\n", err);
    assert_eq!(finalized(&h.surface), vec![(expected, true)]);

    let transcript = h.session.transcript().await;
    assert!(matches!(transcript[1].state, StreamState::Failed(_)));
    assert!(!h.session.controls().await.busy);
}

#[tokio::test]
async fn test_transport_error_renders_failed_turn_and_cleans_up() {
    let h = harness().await;
    h.session.dispatch(Command::ToggleSelection(1)).await;
    h.session
        .dispatch(Command::CommitAttachments(AttachmentKind::Full))
        .await;
    h.transport.push_reply(ScriptedReply::Fail {
        status: Some(500),
        reason: "boom".to_string(),
    });

    let err = h.session.send("Hi").await.unwrap_err();
    assert!(matches!(err, ChatError::Transport { status: Some(500), .. }));
    assert_eq!(
        finalized(&h.surface),
        vec![("<p>[Error: HTTP 500: boom]</p>\n".to_string(), true)]
    );

    let controls = h.session.controls().await;
    assert!(!controls.busy);
    assert!(controls.attachments.is_empty());
    assert!(controls.checked.is_empty());
}

#[tokio::test]
async fn test_empty_send_never_reaches_transport() {
    let h = harness().await;
    let err = h.session.send("   ").await.unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
    assert!(h.transport.sent().is_empty());
    assert!(h.session.transcript().await.is_empty());

    let warned = h.surface.updates().into_iter().any(|u| {
        matches!(u, SurfaceUpdate::Status(n) if n.level == NoticeLevel::Warning)
    });
    assert!(warned);
}

#[tokio::test]
async fn test_context_only_turn_uses_placeholder() {
    let h = harness().await;
    h.session.dispatch(Command::SetWebSearch(true)).await;
    h.transport
        .push_reply(ScriptedReply::Complete("ok".to_string()));

    h.session.send("").await.unwrap();
    let transcript = h.session.transcript().await;
    assert_eq!(
        transcript[0].raw,
        "[UI-MARKER:websearch]\n(Context attached)"
    );
    assert!(h.transport.sent()[0].1.enable_web_search);
}

// ─── Busy gating ─────────────────────────────────────────────────

#[tokio::test]
async fn test_second_send_rejected_while_busy() {
    let h = harness().await;
    let (tx, reply) = ScriptedReply::channel(8);
    h.transport.push_reply(reply);

    let session = h.session.clone();
    let first = tokio::spawn(async move { session.send("first").await });
    wait_until_busy(&h).await;

    let before = h.session.controls().await;
    let err = h.session.send("second").await.unwrap_err();
    assert!(matches!(err, ChatError::Busy));
    assert_eq!(h.session.controls().await, before);
    assert_eq!(h.transport.sent().len(), 1);

    h.session.dispatch(Command::ToggleSelection(1)).await;
    assert!(h.session.controls().await.checked.is_empty());

    tx.send(Ok(Bytes::from("done"))).await.unwrap();
    drop(tx);
    first.await.unwrap().unwrap();

    let controls = h.session.controls().await;
    assert!(!controls.busy);
    h.session.dispatch(Command::ToggleSelection(1)).await;
    assert_eq!(h.session.controls().await.checked, vec![1]);
}

// ─── Chat switching ──────────────────────────────────────────────

#[tokio::test]
async fn test_switch_chat_mid_stream_stops_rendering() {
    let h = harness().await;
    let (tx, reply) = ScriptedReply::channel(8);
    h.transport.push_reply(reply);

    let session = h.session.clone();
    let sending = tokio::spawn(async move { session.send("question").await });
    wait_until_busy(&h).await;

    tx.send(Ok(Bytes::from("first part"))).await.unwrap();
    while h.session.transcript().await.last().map(|e| e.raw.as_str()) != Some("first part") {
        tokio::task::yield_now().await;
    }

    h.session.open_chat(ChatId::new("chat-2")).await.unwrap();
    h.surface.clear();

    tx.send(Ok(Bytes::from(" second part"))).await.unwrap();
    drop(tx);
    sending.await.unwrap().unwrap();

    assert!(slot_texts(&h.surface).is_empty());
    assert!(finalized(&h.surface).is_empty());
    assert!(h.session.transcript().await.is_empty());
    assert!(!h.session.controls().await.busy);
}

#[tokio::test]
async fn test_open_chat_restores_history_with_badges() {
    let chat = ChatId::new("history-chat");
    let transport = Arc::new(MemoryTransport::new().with_history(
        chat.clone(),
        vec![
            HistoryMessage {
                role: Role::User,
                content: "[UI-MARKER:file:plan.pdf:summary]\nWhat is next?".to_string(),
                created_at: None,
            },
            HistoryMessage {
                role: Role::Assistant,
                content: "Ship it.".to_string(),
                created_at: Some(Utc::now()),
            },
        ],
    ));
    let surface = Arc::new(MemorySurface::new());
    let session = ChatSession::new(
        transport,
        surface.clone(),
        Arc::new(MemoryPreferenceStore::default()),
        EngineConfig::default(),
    )
    .unwrap();

    session.open_chat(chat).await.unwrap();
    let transcript = session.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert!(transcript[0].markup.contains("ui-badge-summary"));
    assert!(!transcript[0].markup.contains("UI-MARKER"));
    assert_eq!(transcript[1].markup, "<p>Ship it.</p>\n");
    assert!(surface
        .updates()
        .iter()
        .any(|u| matches!(u, SurfaceUpdate::Reset)));
}

// ─── Context composition ─────────────────────────────────────────

#[tokio::test]
async fn test_full_context_payload_and_cleanup() {
    let h = harness().await;
    h.session.dispatch(Command::ToggleSelection(1)).await;
    h.session.dispatch(Command::ToggleSelection(2)).await;
    h.session
        .dispatch(Command::CommitAttachments(AttachmentKind::Summary))
        .await;
    h.session.load_calendar().await.unwrap();
    h.session.dispatch(Command::SetCalendarActive(true)).await;
    h.session.dispatch(Command::SetWebSearch(true)).await;
    h.session
        .load_session_file("scratch.txt", "text/plain", Bytes::from_static(b"hello"))
        .await;

    let controls = h.session.controls().await;
    assert_eq!(controls.attachments.len(), 2);
    assert_eq!(controls.checked, vec![1, 2]);
    assert_eq!(
        controls.session_file,
        SessionFileView::Ready {
            filename: "scratch.txt".to_string(),
            mime_type: "text/plain".to_string(),
        }
    );

    h.transport
        .push_reply(ScriptedReply::Complete("ok".to_string()));
    h.session.send("Summarize").await.unwrap();

    let (chat, request) = &h.transport.sent()[0];
    assert_eq!(chat, &ChatId::new("chat-1"));
    assert_eq!(request.message, "Summarize");
    assert_eq!(request.attached_files.len(), 2);
    assert_eq!(request.attached_files[0].id, 1);
    assert_eq!(request.attached_files[1].id, 2);
    assert!(request
        .attached_files
        .iter()
        .all(|f| f.kind == AttachmentKind::Summary));
    assert_eq!(request.calendar_context.as_deref(), Some("Mon 09:00 Standup"));
    assert_eq!(request.session_files.len(), 1);
    assert_eq!(request.session_files[0].content, "aGVsbG8=");
    assert!(request.enable_web_search);

    let wire = serde_json::to_value(request).unwrap();
    assert_eq!(wire["attached_files"][0]["type"], "summary");
    assert_eq!(wire["session_files"][0]["mimetype"], "text/plain");

    let user = &h.session.transcript().await[0];
    assert_eq!(
        user.raw,
        "[UI-MARKER:file:report.pdf:summary][UI-MARKER:file:notes.txt:summary][UI-MARKER:file:scratch.txt:session][UI-MARKER:calendar][UI-MARKER:websearch]\nSummarize"
    );
    assert!(user.markup.contains("ui-badge-session"));
    assert!(user.markup.contains("ui-badge-calendar"));

    let controls = h.session.controls().await;
    assert!(controls.attachments.is_empty());
    assert!(controls.checked.is_empty());
    assert_eq!(controls.session_file, SessionFileView::Empty);
    assert!(controls.calendar_loaded);
}

#[tokio::test]
async fn test_files_plugin_disabled_blocks_commit_and_persists() {
    let h = harness().await;
    h.session.dispatch(Command::ToggleSelection(1)).await;
    h.session
        .dispatch(Command::SetPlugin {
            plugin: Plugin::Files,
            enabled: false,
        })
        .await;
    h.surface.clear();

    h.session
        .dispatch(Command::CommitAttachments(AttachmentKind::Full))
        .await;
    let controls = h.session.controls().await;
    assert!(controls.attachments.is_empty());
    assert!(controls.checked.is_empty());

    let notices: Vec<_> = h
        .surface
        .updates()
        .into_iter()
        .filter_map(|u| match u {
            SurfaceUpdate::Status(n) => Some(n),
            _ => None,
        })
        .collect();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.contains("files plugin is disabled"));
    assert_eq!(
        h.prefs.get("plugins.files").unwrap(),
        Some(serde_json::json!(false))
    );
}

#[tokio::test]
async fn test_catalog_refresh_drops_removed_files() {
    let h = harness().await;
    h.session.dispatch(Command::ToggleSelection(1)).await;
    h.session.dispatch(Command::ToggleSelection(2)).await;
    h.session
        .dispatch(Command::CommitAttachments(AttachmentKind::Full))
        .await;

    h.transport.set_files(vec![entry(2, "notes.txt", false)]);
    h.session.refresh_catalog().await.unwrap();

    let controls = h.session.controls().await;
    assert_eq!(controls.checked, vec![2]);
    assert_eq!(controls.attachments.len(), 1);
    assert_eq!(controls.attachments[0].file_id, 2);
}

// ─── Session files ───────────────────────────────────────────────

#[tokio::test]
async fn test_session_file_from_path() {
    let dir = std::env::temp_dir().join(format!("a3s-chat-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("draft.txt");
    std::fs::write(&path, "draft body").unwrap();

    let h = harness().await;
    tokio_test::assert_ok!(h.session.load_session_file_from_path(&path).await);
    assert_eq!(
        h.session.controls().await.session_file,
        SessionFileView::Ready {
            filename: "draft.txt".to_string(),
            mime_type: "text/plain".to_string(),
        }
    );

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_session_file_missing_path_is_transient_error() {
    let h = harness().await;
    let err = tokio_test::assert_err!(
        h.session
            .load_session_file_from_path("/nonexistent/a3s-chat/missing.txt")
            .await
    );
    assert!(matches!(err, ChatError::FileRead(_)));

    let notice = h
        .surface
        .updates()
        .into_iter()
        .find_map(|u| match u {
            SurfaceUpdate::Status(n) => Some(n),
            _ => None,
        })
        .unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.ttl, Some(std::time::Duration::from_secs(3)));
    assert_eq!(
        h.session.controls().await.session_file,
        SessionFileView::Empty
    );
}

#[tokio::test]
async fn test_newer_session_file_replaces_older() {
    let h = harness().await;
    h.session
        .load_session_file("a.txt", "text/plain", Bytes::from_static(b"a"))
        .await;
    h.session
        .load_session_file("b.txt", "text/plain", Bytes::from_static(b"b"))
        .await;

    h.transport
        .push_reply(ScriptedReply::Complete("ok".to_string()));
    h.session.send("which?").await.unwrap();
    let request = &h.transport.sent()[0].1;
    assert_eq!(request.session_files.len(), 1);
    assert_eq!(request.session_files[0].filename, "b.txt");
}

// ─── Preferences ─────────────────────────────────────────────────

#[tokio::test]
async fn test_preferences_survive_restart() {
    let dir = std::env::temp_dir().join(format!("a3s-chat-it-{}", uuid::Uuid::new_v4()));
    let path = dir.join("prefs.json");

    {
        let session = ChatSession::new(
            Arc::new(MemoryTransport::new()),
            Arc::new(MemorySurface::new()),
            Arc::new(FilePreferenceStore::new(&path)),
            EngineConfig::default(),
        )
        .unwrap();
        session
            .dispatch(Command::SetPlugin {
                plugin: Plugin::WebSearch,
                enabled: false,
            })
            .await;
        session.set_last_tab("calendar").unwrap();
        session.set_collapsed("files", true).unwrap();
    }

    let session = ChatSession::new(
        Arc::new(MemoryTransport::new()),
        Arc::new(MemorySurface::new()),
        Arc::new(FilePreferenceStore::new(&path)),
        EngineConfig::default(),
    )
    .unwrap();
    let prefs = session.preferences();
    assert!(!prefs.plugins.web_search);
    assert!(prefs.plugins.files);
    assert_eq!(prefs.last_tab.as_deref(), Some("calendar"));
    assert_eq!(prefs.collapsed.get("files"), Some(&true));
    assert!(!session.controls().await.plugins.web_search);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_calendar_activation_restored_from_preferences() {
    let prefs = Arc::new(MemoryPreferenceStore::default());
    prefs
        .set("calendar.active", serde_json::json!(true))
        .unwrap();
    let session = ChatSession::new(
        Arc::new(MemoryTransport::new().with_calendar("Fri: retro")),
        Arc::new(MemorySurface::new()),
        prefs,
        EngineConfig::default(),
    )
    .unwrap();

    assert!(!session.controls().await.calendar_active);
    session.load_calendar().await.unwrap();
    assert!(session.controls().await.calendar_active);
}
