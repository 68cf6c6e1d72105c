//! Session behaviour against a scripted transport.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::Mutex;
use std::time::Duration;

use futures::StreamExt;
use llamawrap_turn::{Session, TurnPhase};
use llamawrap_types::{
    ChatRequest, ChunkStream, Format, GenerateRequest, Message, Options, RawChunk, Role,
    Transcript, Transport, TransportError, TurnError,
};
use tokio_util::sync::CancellationToken;

/// How the fake server answers one request.
enum Script {
    /// The request itself fails.
    Refuse(TransportError),
    /// The response replays these items and ends.
    Reply(Vec<Result<RawChunk, TransportError>>),
    /// The response replays these chunks and then never ends.
    Stall(Vec<RawChunk>),
    /// The request never opens.
    Hang,
}

impl Script {
    fn chunks(parts: &[&str]) -> Self {
        let last = parts.len().saturating_sub(1);
        Self::Reply(
            parts
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let chunk = RawChunk::new(Role::Assistant, *p).with_model("llama3");
                    Ok(if i == last { chunk.finished("stop") } else { chunk })
                })
                .collect(),
        )
    }

    fn into_result(self) -> Result<ChunkStream, TransportError> {
        match self {
            Self::Refuse(e) => Err(e),
            Self::Hang => unreachable!("a hanging request has no result"),
            Self::Reply(items) => Ok(ChunkStream::from_results(items)),
            Self::Stall(chunks) => {
                let items: Vec<Result<RawChunk, TransportError>> =
                    chunks.into_iter().map(Ok).collect();
                Ok(ChunkStream::new(
                    futures::stream::iter(items).chain(futures::stream::pending()),
                ))
            }
        }
    }
}

/// A transport that answers from a queue and records every request.
#[derive(Default)]
struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    chats: Mutex<Vec<ChatRequest>>,
    generates: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedTransport {
    fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        }
    }

    fn next_script(&self) -> Script {
        self.scripts
            .lock()
            .expect("test lock poisoned")
            .pop_front()
            .expect("ScriptedTransport: no more scripts configured")
    }

    fn chats(&self) -> Vec<ChatRequest> {
        self.chats.lock().expect("test lock poisoned").clone()
    }

    fn generates(&self) -> Vec<GenerateRequest> {
        self.generates.lock().expect("test lock poisoned").clone()
    }
}

impl Transport for ScriptedTransport {
    fn send_chat(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChunkStream, TransportError>> + Send {
        self.chats.lock().expect("test lock poisoned").push(request);
        answer(self.next_script())
    }

    fn send_generate(
        &self,
        request: GenerateRequest,
    ) -> impl Future<Output = Result<ChunkStream, TransportError>> + Send {
        self.generates.lock().expect("test lock poisoned").push(request);
        answer(self.next_script())
    }
}

async fn answer(script: Script) -> Result<ChunkStream, TransportError> {
    match script {
        Script::Hang => std::future::pending().await,
        script => script.into_result(),
    }
}

fn history() -> Transcript {
    Transcript::from(vec![
        Message::system("You are terse."),
        Message::user("Hi"),
        Message::assistant("Hello."),
    ])
}

#[tokio::test]
async fn streamed_fragments_build_one_reply() {
    let session = Session::new(ScriptedTransport::new(vec![Script::chunks(&["Hello", ", world"])]));
    let prior = Transcript::new();

    let mut fragments = Vec::new();
    let transcript = session
        .chat_stream_with(&prior, Message::user("Say hello"), |view| {
            assert_eq!(view.role, Role::Assistant);
            fragments.push(view.fragment);
            ControlFlow::Continue(())
        })
        .await
        .expect("turn should succeed");

    assert_eq!(fragments, vec!["Hello", ", world"]);
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript.messages()[0], Message::user("Say hello"));
    assert_eq!(transcript.messages()[1], Message::assistant("Hello, world"));
    assert!(prior.is_empty());
}

#[tokio::test]
async fn chat_sends_history_and_appends_two_messages() {
    let transport = ScriptedTransport::new(vec![Script::chunks(&["Fine, thanks."])]);
    let session = Session::new(transport);
    let prior = history();

    let transcript = session
        .chat(&prior, Message::user("How are you?"))
        .await
        .expect("turn should succeed");

    assert_eq!(transcript.len(), prior.len() + 2);
    assert_eq!(&transcript.messages()[..prior.len()], prior.messages());
    assert_eq!(transcript.last(), Some(&Message::assistant("Fine, thanks.")));

    let sent = session.transport().chats();
    assert_eq!(sent.len(), 1);
    assert!(!sent[0].stream);
    assert_eq!(sent[0].model, "llama3");
    assert_eq!(sent[0].messages.len(), 4);
    assert_eq!(sent[0].messages[3], Message::user("How are you?"));
    assert!(sent[0].options.is_none());
}

#[tokio::test]
async fn streaming_and_non_streaming_agree() {
    let parts = ["The sky ", "is blue ", "because of Rayleigh scattering."];
    let session = Session::new(ScriptedTransport::new(vec![
        Script::chunks(&parts),
        Script::chunks(&parts),
    ]));
    let prior = history();

    let whole = session
        .chat(&prior, Message::user("Why is the sky blue?"))
        .await
        .unwrap();
    let streamed = session
        .chat_stream_with(&prior, Message::user("Why is the sky blue?"), |_| {
            ControlFlow::Continue(())
        })
        .await
        .unwrap();

    assert_eq!(whole, streamed);
    let sent = session.transport().chats();
    assert!(!sent[0].stream);
    assert!(sent[1].stream);
}

#[tokio::test]
async fn empty_response_keeps_only_the_user_message() {
    let session = Session::new(ScriptedTransport::new(vec![Script::Reply(vec![])]));
    let prior = history();

    let failure = session
        .chat(&prior, Message::user("Anyone there?"))
        .await
        .unwrap_err();

    assert!(failure.is_empty_response());
    assert_eq!(failure.transcript.len(), prior.len() + 1);
    assert_eq!(failure.transcript.last(), Some(&Message::user("Anyone there?")));
}

#[tokio::test]
async fn refused_request_keeps_only_the_user_message() {
    let session = Session::new(ScriptedTransport::new(vec![Script::Refuse(
        TransportError::ModelNotFound("llama9".into()),
    )]));

    let mut views = 0;
    let failure = session
        .chat_stream_with(&Transcript::new(), Message::user("Hi"), |_| {
            views += 1;
            ControlFlow::Continue(())
        })
        .await
        .unwrap_err();

    assert_eq!(views, 0);
    assert!(matches!(
        failure.error,
        TurnError::Transport(TransportError::ModelNotFound(_))
    ));
    assert_eq!(failure.transcript.len(), 1);
}

#[tokio::test]
async fn mid_stream_error_discards_partial_reply() {
    let session = Session::new(ScriptedTransport::new(vec![Script::Reply(vec![
        Ok(RawChunk::new(Role::Assistant, "Once upon")),
        Err(TransportError::Stream("connection reset".into())),
    ])]));

    let mut fragments = Vec::new();
    let failure = session
        .chat_stream_with(&history(), Message::user("Tell a story"), |view| {
            fragments.push(view.fragment);
            ControlFlow::Continue(())
        })
        .await
        .unwrap_err();

    assert_eq!(fragments, vec!["Once upon"]);
    assert!(matches!(
        failure.error,
        TurnError::Transport(TransportError::Stream(_))
    ));
    assert_eq!(failure.transcript.len(), history().len() + 1);
    assert_eq!(failure.transcript.last().map(|m| m.role), Some(Role::User));
}

#[tokio::test]
async fn breaking_from_the_callback_cancels_the_turn() {
    let session = Session::new(ScriptedTransport::new(vec![Script::chunks(&[
        "one", "two", "three",
    ])]));

    let mut seen = Vec::new();
    let failure = session
        .chat_stream_with(&Transcript::new(), Message::user("Count"), |view| {
            seen.push(view.fragment);
            ControlFlow::Break(())
        })
        .await
        .unwrap_err();

    assert_eq!(seen, vec!["one"]);
    assert!(failure.is_cancelled());
    assert_eq!(failure.transcript.len(), 1);
}

#[tokio::test]
async fn caller_token_stops_a_stalled_turn() {
    let session = Session::new(ScriptedTransport::new(vec![Script::Stall(vec![
        RawChunk::new(Role::Assistant, "thinking"),
    ])]));
    let token = CancellationToken::new();

    let mut turn = session
        .chat_stream(&Transcript::new(), Message::user("Hard question"), &token)
        .await;
    assert_eq!(turn.next().await.map(|v| v.fragment).as_deref(), Some("thinking"));
    assert_eq!(turn.partial_content(), "thinking");

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    assert!(turn.next().await.is_none());
    assert_eq!(turn.phase(), TurnPhase::Cancelled);
    let failure = turn.finish().await.unwrap_err();
    assert!(failure.is_cancelled());
    assert_eq!(failure.transcript, Transcript::from(vec![Message::user("Hard question")]));
}

#[tokio::test]
async fn session_timeout_cancels_a_stalled_turn() {
    let session = Session::new(ScriptedTransport::new(vec![Script::Stall(vec![])]))
        .timeout(Duration::from_millis(30));

    let failure = session
        .chat(&Transcript::new(), Message::user("Hello?"))
        .await
        .unwrap_err();
    assert!(failure.is_cancelled());
}

#[tokio::test]
async fn session_config_reaches_the_request() {
    let session = Session::new(ScriptedTransport::new(vec![Script::chunks(&["ok"])]))
        .model("mistral")
        .options(Options::new().temperature(0.1))
        .keep_alive("10m");

    session
        .chat(&Transcript::new(), Message::user("Hi"))
        .await
        .unwrap();

    let sent = &session.transport().chats()[0];
    assert_eq!(sent.model, "mistral");
    assert_eq!(sent.keep_alive.as_deref(), Some("10m"));
    assert_eq!(
        sent.options.as_ref().and_then(|o| o.get("temperature")),
        Some(&serde_json::json!(0.1))
    );
}

#[tokio::test]
async fn generate_returns_the_folded_text() {
    let session = Session::new(ScriptedTransport::new(vec![Script::chunks(&["llama"])]));

    let text = session.generate("repeat after me: ", "llama").await.unwrap();
    assert_eq!(text, "llama");

    let sent = &session.transport().generates()[0];
    assert_eq!(sent.system.as_deref(), Some("repeat after me: "));
    assert_eq!(sent.prompt, "llama");
    assert!(!sent.stream);
    assert!(sent.format.is_none());
}

#[tokio::test]
async fn generate_without_system_prompt_omits_it() {
    let session = Session::new(ScriptedTransport::new(vec![Script::chunks(&["4"])]));
    session.generate("", "2+2=").await.unwrap();
    assert!(session.transport().generates()[0].system.is_none());
}

#[tokio::test]
async fn generate_with_options_overrides_session_options() {
    let session = Session::new(ScriptedTransport::new(vec![Script::chunks(&["x"])]))
        .options(Options::new().seed(1));

    session
        .generate_with_options("", "p", &Options::new().temperature(1.5))
        .await
        .unwrap();

    let options = session.transport().generates()[0].options.clone().unwrap();
    assert!(options.get("seed").is_none());
    assert!(options.get("temperature").is_some());
}

#[tokio::test]
async fn generate_formatted_sends_the_format() {
    let session = Session::new(ScriptedTransport::new(vec![Script::chunks(&[
        "{\"answer\":",
        "4}",
    ])]));

    let text = session
        .generate_formatted("", "2+2 as JSON", &Options::new(), Format::Json)
        .await
        .unwrap();

    assert_eq!(text, "{\"answer\":4}");
    assert_eq!(session.transport().generates()[0].format, Some(Format::Json));
}

#[tokio::test]
async fn generate_with_no_chunks_is_empty_response() {
    let session = Session::new(ScriptedTransport::new(vec![Script::Reply(vec![])]));
    let err = session.generate("", "p").await.unwrap_err();
    assert!(matches!(err, TurnError::EmptyResponse));
}

#[tokio::test]
async fn generate_stream_surfaces_every_chunk() {
    let session = Session::new(ScriptedTransport::new(vec![Script::chunks(&[
        "a", "b", "c",
    ])]));

    let mut response = session
        .generate_stream("", "abc", &CancellationToken::new())
        .await;
    let mut views = Vec::new();
    while let Some(view) = response.next().await {
        views.push(view);
    }

    assert_eq!(views.len(), 3);
    assert!(views[..2].iter().all(|v| !v.done));
    assert!(views[2].done);
    assert_eq!(views[2].done_reason.as_deref(), Some("stop"));
    assert_eq!(response.finish().await.unwrap().content, "abc");
    assert!(session.transport().generates()[0].stream);
}

#[tokio::test]
async fn timeout_bounds_a_request_that_never_opens() {
    let session = Session::new(ScriptedTransport::new(vec![Script::Hang]))
        .timeout(Duration::from_millis(50));

    let failure = tokio::time::timeout(
        Duration::from_secs(2),
        session.chat(&history(), Message::user("Still there?")),
    )
    .await
    .expect("chat should give up at the session timeout")
    .unwrap_err();

    assert!(failure.is_cancelled());
    assert_eq!(failure.transcript.len(), 4);
    assert_eq!(failure.transcript.last(), Some(&Message::user("Still there?")));
}

#[tokio::test]
async fn cancelled_token_stops_a_stream_that_never_opens() {
    let session = Session::new(ScriptedTransport::new(vec![Script::Hang]));
    let token = CancellationToken::new();
    token.cancel();

    let failure = tokio::time::timeout(Duration::from_secs(2), async {
        let mut turn = session
            .chat_stream(&Transcript::new(), Message::user("Hello?"), &token)
            .await;
        assert_eq!(turn.phase(), TurnPhase::Cancelled);
        assert!(turn.next().await.is_none());
        turn.finish().await
    })
    .await
    .expect("chat_stream should return once the token is cancelled")
    .unwrap_err();

    assert!(matches!(failure.error, TurnError::Cancelled));
    assert_eq!(failure.transcript, Transcript::from(vec![Message::user("Hello?")]));
}

#[tokio::test]
async fn timeout_bounds_a_generate_that_never_opens() {
    let session = Session::new(ScriptedTransport::new(vec![Script::Hang]))
        .timeout(Duration::from_millis(50));

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        session.generate("", "Why is the sky blue?"),
    )
    .await
    .expect("generate should give up at the session timeout");

    assert!(matches!(result, Err(TurnError::Cancelled)));
}
