//! Stream hub: one public and one private socket shared by every consumer.
//!
//! # Session lifecycle
//!
//! 1. **Connect**: both sockets are opened by a supervisor task
//! 2. **Login**: the private socket sends a signed login frame on open
//! 3. **Replay**: recorded public subscriptions are resent on open, private
//!    ones after the login acknowledgement (when replay is enabled)
//! 4. **Read loop**: pings are answered, acks logged, data frames routed by
//!    channel to every registered handler
//! 5. **Reconnect**: when either socket closes or errors, or a reconnect is
//!    requested, both sockets are dropped and reopened after a fixed delay
//!
//! Consumers never own a socket; they register handlers through
//! [`MarketFeed`].

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};

use super::signer::RequestSigner;
use super::status::ConnectionStatus;
use crate::error::{Error, Result};
use crate::port::{ChannelArg, Endpoint, FrameHandler, MarketFeed, StreamFrame, Subscription};
use crate::resilience::ErrorHandler;

const PONG_FRAME: &str = r#"{"event":"pong"}"#;

/// Socket endpoints and reconnect behaviour of a [`StreamHub`].
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub public_url: String,
    pub private_url: String,
    pub reconnect_delay: Duration,
    pub replay_subscriptions: bool,
}

/// Classified inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    Ping,
    Ack { event: String, arg: Option<ChannelArg> },
    Login { ok: bool, message: String },
    Rejected { code: String, message: String },
    Data(StreamFrame),
    Ignored,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    arg: Option<RawArg>,
    #[serde(default)]
    data: Option<Vec<Value>>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawArg {
    channel: String,
    #[serde(rename = "instId", default)]
    inst_id: Option<String>,
}

impl From<RawArg> for ChannelArg {
    fn from(arg: RawArg) -> Self {
        Self {
            channel: arg.channel,
            inst_id: arg.inst_id,
        }
    }
}

pub(crate) fn classify(text: &str) -> Result<Inbound> {
    if text == "ping" {
        return Ok(Inbound::Ping);
    }
    let raw: RawFrame = serde_json::from_str(text)
        .map_err(|e| Error::Protocol(format!("unparseable frame: {e}")))?;

    match raw.event.as_deref() {
        Some("ping") => Ok(Inbound::Ping),
        Some(event @ ("subscribe" | "unsubscribe")) => Ok(Inbound::Ack {
            event: event.to_string(),
            arg: raw.arg.map(Into::into),
        }),
        Some("login") => Ok(Inbound::Login {
            ok: raw.code.as_deref().unwrap_or("0") == "0",
            message: raw.msg.unwrap_or_default(),
        }),
        Some("error") => Ok(Inbound::Rejected {
            code: raw.code.unwrap_or_default(),
            message: raw.msg.unwrap_or_default(),
        }),
        Some(_) => Ok(Inbound::Ignored),
        None => match (raw.arg, raw.data) {
            (Some(arg), Some(data)) => Ok(Inbound::Data(StreamFrame {
                channel: arg.channel,
                inst_id: arg.inst_id,
                data,
            })),
            (_, Some(_)) => Err(Error::Protocol("data frame without arg".into())),
            _ => Ok(Inbound::Ignored),
        },
    }
}

fn op_frame(op: &str, args: &[ChannelArg]) -> String {
    json!({ "op": op, "args": args }).to_string()
}

struct HubInner {
    settings: StreamSettings,
    signer: RequestSigner,
    status: Arc<ConnectionStatus>,
    errors: Arc<ErrorHandler>,
    handlers: DashMap<String, Vec<FrameHandler>>,
    subscriptions: Mutex<BTreeSet<Subscription>>,
    outbound: RwLock<HashMap<Endpoint, mpsc::UnboundedSender<String>>>,
    logged_in: AtomicBool,
    running: AtomicBool,
    /// Reconnect request generation. A session marks every earlier request
    /// as seen when it opens.
    reconnect: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
}

pub struct StreamHub {
    inner: Arc<HubInner>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl StreamHub {
    #[must_use]
    pub fn new(
        settings: StreamSettings,
        signer: RequestSigner,
        status: Arc<ConnectionStatus>,
        errors: Arc<ErrorHandler>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (reconnect, _) = watch::channel(0);
        Self {
            inner: Arc::new(HubInner {
                settings,
                signer,
                status,
                errors,
                handlers: DashMap::new(),
                subscriptions: Mutex::new(BTreeSet::new()),
                outbound: RwLock::new(HashMap::new()),
                logged_in: AtomicBool::new(false),
                running: AtomicBool::new(false),
                reconnect,
                shutdown,
            }),
            supervisor: Mutex::new(None),
        }
    }

    /// Open both sockets. Returns `false` if already running.
    pub fn start(&self) -> bool {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.shutdown.send_replace(false);
        let inner = Arc::clone(&self.inner);
        *self.supervisor.lock() = Some(tokio::spawn(inner.supervise()));
        info!("Stream hub started");
        true
    }

    /// Close both sockets and stop reconnecting.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown.send_replace(true);
        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Stream supervisor ended abnormally");
            }
        }
        self.inner.mark_down();
        info!("Stream hub stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Drop both sockets and reconnect after the configured delay.
    ///
    /// Requests made while a reconnect is already under way are folded into
    /// it.
    pub fn reconnect(&self) {
        if self.is_running() {
            self.inner
                .reconnect
                .send_modify(|generation| *generation = generation.wrapping_add(1));
        }
    }

    /// Subscriptions that will be replayed on reconnect.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.subscriptions.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn status(&self) -> &Arc<ConnectionStatus> {
        &self.inner.status
    }

    /// Route a frame to the handlers of its channel.
    pub fn dispatch(&self, frame: &StreamFrame) {
        self.inner.dispatch(frame);
    }
}

impl HubInner {
    fn url(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Public => &self.settings.public_url,
            Endpoint::Private => &self.settings.private_url,
        }
    }

    fn is_connected(&self, endpoint: Endpoint) -> bool {
        self.outbound.read().contains_key(&endpoint)
    }

    fn send(&self, endpoint: Endpoint, frame: String) -> bool {
        match self.outbound.read().get(&endpoint) {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    fn recorded_args(&self, endpoint: Endpoint) -> Vec<ChannelArg> {
        self.subscriptions
            .lock()
            .iter()
            .filter(|s| s.endpoint == endpoint)
            .map(|s| s.arg.clone())
            .collect()
    }

    fn replay_frame(&self, endpoint: Endpoint) -> Option<String> {
        if !self.settings.replay_subscriptions {
            return None;
        }
        let args = self.recorded_args(endpoint);
        if args.is_empty() {
            return None;
        }
        info!(endpoint = %endpoint, count = args.len(), "Replaying subscriptions");
        Some(op_frame("subscribe", &args))
    }

    fn dispatch(&self, frame: &StreamFrame) {
        let handlers = match self.handlers.get(&frame.channel) {
            Some(entry) => entry.value().clone(),
            None => {
                trace!(channel = %frame.channel, "No handler for channel");
                return;
            }
        };
        for handler in handlers {
            handler(frame);
        }
    }

    fn mark_down(&self) {
        self.outbound.write().clear();
        self.logged_in.store(false, Ordering::SeqCst);
        self.status.set_stream(Endpoint::Public, false);
        self.status.set_stream(Endpoint::Private, false);
    }

    async fn supervise(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        let mut requests = self.reconnect.subscribe();
        while self.running.load(Ordering::SeqCst) {
            let generation = *requests.borrow_and_update();
            let mut public = tokio::spawn(Arc::clone(&self).session(Endpoint::Public));
            let mut private = tokio::spawn(Arc::clone(&self).session(Endpoint::Private));

            let stopping = tokio::select! {
                result = &mut public => {
                    self.session_ended(Endpoint::Public, result).await;
                    false
                }
                result = &mut private => {
                    self.session_ended(Endpoint::Private, result).await;
                    false
                }
                _ = requests.changed() => {
                    info!(generation, "Stream reconnect requested");
                    false
                }
                _ = shutdown.changed() => true,
            };

            public.abort();
            private.abort();
            self.mark_down();

            if stopping || !self.running.load(Ordering::SeqCst) {
                break;
            }

            let delay = self.settings.reconnect_delay;
            info!(delay_ms = delay.as_millis() as u64, "Reconnecting streams");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }
        debug!("Stream supervisor exited");
    }

    async fn session_ended(&self, endpoint: Endpoint, result: std::result::Result<Result<()>, JoinError>) {
        let context = format!("stream.{endpoint}");
        match result {
            Ok(Ok(())) => info!(endpoint = %endpoint, "Stream closed"),
            Ok(Err(err)) => {
                self.status.set_stream(endpoint, false);
                self.errors.handle(&err, &context).await;
            }
            Err(join_error) if join_error.is_panic() => {
                error!(endpoint = %endpoint, "Stream session panicked");
            }
            Err(_) => {}
        }
    }

    async fn session(self: Arc<Self>, endpoint: Endpoint) -> Result<()> {
        let url = self.url(endpoint).to_string();
        info!(endpoint = %endpoint, url = %url, "Connecting stream");
        let (ws, response) = connect_async(url.as_str()).await?;
        info!(endpoint = %endpoint, status = %response.status(), "Stream connected");

        let (mut sink, mut source) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        self.status.set_stream(endpoint, true);

        match endpoint {
            Endpoint::Private => {
                sink.send(Message::Text(self.signer.login_frame()?)).await?;
                debug!("Login frame sent");
            }
            Endpoint::Public => {
                if let Some(frame) = self.replay_frame(Endpoint::Public) {
                    sink.send(Message::Text(frame)).await?;
                }
            }
        }
        self.outbound.write().insert(endpoint, tx);

        loop {
            tokio::select! {
                Some(frame) = rx.recv() => {
                    trace!(endpoint = %endpoint, frame = %frame, "Sending frame");
                    sink.send(Message::Text(frame)).await?;
                }
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = self.on_text(endpoint, &text).await {
                            sink.send(Message::Text(reply)).await?;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        sink.send(Message::Pong(payload)).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(endpoint = %endpoint, frame = ?frame, "Stream closed by server");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                }
            }
        }
    }

    /// Handle one text frame; returns the reply to send, if any.
    async fn on_text(&self, endpoint: Endpoint, text: &str) -> Option<String> {
        match classify(text) {
            Ok(Inbound::Ping) => Some(PONG_FRAME.to_string()),
            Ok(Inbound::Data(frame)) => {
                self.dispatch(&frame);
                None
            }
            Ok(Inbound::Ack { event, arg }) => {
                info!(endpoint = %endpoint, event = %event, arg = ?arg, "Subscription acknowledged");
                None
            }
            Ok(Inbound::Login { ok: true, .. }) => {
                info!("Private stream logged in");
                self.logged_in.store(true, Ordering::SeqCst);
                self.replay_frame(Endpoint::Private)
            }
            Ok(Inbound::Login { ok: false, message }) => {
                let err = Error::ExchangeRejection {
                    status: 401,
                    body: format!("login rejected: {message}"),
                };
                self.errors.handle(&err, "stream.private").await;
                None
            }
            Ok(Inbound::Rejected { code, message }) => {
                let err = Error::Protocol(format!("stream error {code}: {message}"));
                self.errors.handle(&err, &format!("stream.{endpoint}")).await;
                None
            }
            Ok(Inbound::Ignored) => None,
            Err(err) => {
                self.errors.handle(&err, &format!("stream.{endpoint}")).await;
                None
            }
        }
    }
}

impl MarketFeed for StreamHub {
    fn subscribe(&self, subscriptions: &[Subscription], handler: FrameHandler) -> Result<()> {
        let inner = &self.inner;
        if !inner.settings.replay_subscriptions {
            if let Some(down) = subscriptions.iter().find(|s| !inner.is_connected(s.endpoint)) {
                return Err(Error::Connection(format!(
                    "{} stream not connected",
                    down.endpoint
                )));
            }
        }

        let channels: BTreeSet<&str> = subscriptions.iter().map(Subscription::channel).collect();
        for channel in channels {
            inner
                .handlers
                .entry(channel.to_string())
                .or_default()
                .push(Arc::clone(&handler));
        }

        let fresh: Vec<Subscription> = {
            let mut recorded = inner.subscriptions.lock();
            subscriptions
                .iter()
                .filter(|s| recorded.insert((*s).clone()))
                .cloned()
                .collect()
        };

        for endpoint in [Endpoint::Public, Endpoint::Private] {
            let args: Vec<ChannelArg> = fresh
                .iter()
                .filter(|s| s.endpoint == endpoint)
                .map(|s| s.arg.clone())
                .collect();
            if args.is_empty() {
                continue;
            }
            let awaiting_login = endpoint == Endpoint::Private
                && inner.settings.replay_subscriptions
                && !inner.logged_in.load(Ordering::SeqCst);
            if awaiting_login || !inner.send(endpoint, op_frame("subscribe", &args)) {
                debug!(endpoint = %endpoint, count = args.len(), "Subscription deferred until connected");
            } else {
                info!(endpoint = %endpoint, count = args.len(), "Subscribing");
            }
        }
        Ok(())
    }

    fn unsubscribe(&self, subscriptions: &[Subscription]) -> Result<()> {
        let inner = &self.inner;
        let removed: Vec<Subscription> = {
            let mut recorded = inner.subscriptions.lock();
            subscriptions
                .iter()
                .filter(|s| recorded.remove(*s))
                .cloned()
                .collect()
        };

        for endpoint in [Endpoint::Public, Endpoint::Private] {
            let args: Vec<ChannelArg> = removed
                .iter()
                .filter(|s| s.endpoint == endpoint)
                .map(|s| s.arg.clone())
                .collect();
            if !args.is_empty() {
                inner.send(endpoint, op_frame("unsubscribe", &args));
            }
        }

        let recorded = inner.subscriptions.lock();
        for sub in &removed {
            if !recorded.iter().any(|s| s.channel() == sub.channel()) {
                inner.handlers.remove(sub.channel());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::WebSocketStream;

    use super::*;
    use crate::infrastructure::config::Credentials;
    use crate::resilience::HandlerSettings;

    const LOGIN_ACK: &str = r#"{"event":"login","code":"0","msg":""}"#;

    /// Local socket servers for both endpoints, recording what the hub sends.
    #[derive(Clone, Default)]
    struct Wire {
        opened: Arc<Mutex<Vec<(Endpoint, Instant)>>>,
        frames: Arc<Mutex<Vec<(Endpoint, usize, String)>>>,
        ack_login: Arc<AtomicBool>,
        ping_first_public: Arc<AtomicBool>,
        close_first_public: Arc<AtomicBool>,
    }

    impl Wire {
        async fn listen(&self, endpoint: Endpoint) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("ws://{}/ws", listener.local_addr().unwrap());
            let wire = self.clone();
            tokio::spawn(async move {
                let mut connection = 0;
                while let Ok((tcp, _)) = listener.accept().await {
                    let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
                        continue;
                    };
                    connection += 1;
                    wire.opened.lock().push((endpoint, Instant::now()));
                    tokio::spawn(wire.clone().serve(endpoint, connection, ws));
                }
            });
            url
        }

        async fn serve(self, endpoint: Endpoint, connection: usize, ws: WebSocketStream<TcpStream>) {
            let (mut sink, mut source) = ws.split();
            if endpoint == Endpoint::Public && connection == 1 {
                if self.close_first_public.load(Ordering::SeqCst) {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
                if self.ping_first_public.load(Ordering::SeqCst) {
                    let _ = sink.send(Message::Text("ping".into())).await;
                }
            }
            while let Some(Ok(message)) = source.next().await {
                let Message::Text(text) = message else {
                    continue;
                };
                let login = text.contains(r#""op":"login""#);
                self.frames.lock().push((endpoint, connection, text));
                if login
                    && self.ack_login.load(Ordering::SeqCst)
                    && sink.send(Message::Text(LOGIN_ACK.into())).await.is_err()
                {
                    break;
                }
            }
        }

        fn handshakes(&self) -> usize {
            self.opened.lock().len()
        }

        fn opened_at(&self, endpoint: Endpoint) -> Vec<Instant> {
            self.opened
                .lock()
                .iter()
                .filter(|(e, _)| *e == endpoint)
                .map(|(_, at)| *at)
                .collect()
        }

        fn frames(&self, endpoint: Endpoint, connection: usize) -> Vec<Value> {
            self.frames
                .lock()
                .iter()
                .filter(|(e, c, _)| *e == endpoint && *c == connection)
                .map(|(_, _, text)| serde_json::from_str(text).unwrap())
                .collect()
        }
    }

    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..250 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        check()
    }

    fn errors() -> Arc<ErrorHandler> {
        Arc::new(ErrorHandler::new(HandlerSettings {
            report_dir: None,
            ..HandlerSettings::default()
        }))
    }

    fn signer() -> RequestSigner {
        RequestSigner::new(&Credentials::new("k", "s", "p")).unwrap()
    }

    async fn live_hub(wire: &Wire, reconnect_delay: Duration) -> StreamHub {
        let settings = StreamSettings {
            public_url: wire.listen(Endpoint::Public).await,
            private_url: wire.listen(Endpoint::Private).await,
            reconnect_delay,
            replay_subscriptions: true,
        };
        StreamHub::new(settings, signer(), Arc::new(ConnectionStatus::new()), errors())
    }

    fn hub(replay: bool) -> StreamHub {
        let settings = StreamSettings {
            public_url: "ws://127.0.0.1:1/public".into(),
            private_url: "ws://127.0.0.1:1/private".into(),
            reconnect_delay: Duration::from_secs(5),
            replay_subscriptions: replay,
        };
        StreamHub::new(settings, signer(), Arc::new(ConnectionStatus::new()), errors())
    }

    fn counting_handler(counter: &Arc<AtomicUsize>) -> FrameHandler {
        let counter = Arc::clone(counter);
        Arc::new(move |_frame: &StreamFrame| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn classifies_ping_and_acks() {
        assert_eq!(classify(r#"{"event":"ping"}"#).unwrap(), Inbound::Ping);
        assert_eq!(classify("ping").unwrap(), Inbound::Ping);

        let ack = classify(r#"{"event":"subscribe","arg":{"channel":"tickers","instId":"BTC-USDT"}}"#)
            .unwrap();
        assert!(matches!(ack, Inbound::Ack { ref event, .. } if event == "subscribe"));

        let login = classify(r#"{"event":"login","code":"0","msg":""}"#).unwrap();
        assert!(matches!(login, Inbound::Login { ok: true, .. }));
        let denied = classify(r#"{"event":"login","code":"60009","msg":"Login failed"}"#).unwrap();
        assert!(matches!(denied, Inbound::Login { ok: false, .. }));
    }

    #[test]
    fn classifies_data_frames() {
        let frame = classify(
            r#"{"arg":{"channel":"tickers","instId":"ETH-USDT"},"data":[{"last":"2000"}]}"#,
        )
        .unwrap();
        let Inbound::Data(frame) = frame else {
            panic!("expected data frame");
        };
        assert_eq!(frame.channel, "tickers");
        assert_eq!(frame.inst_id.as_deref(), Some("ETH-USDT"));
        assert_eq!(frame.data.len(), 1);
    }

    #[test]
    fn malformed_frame_is_protocol_error() {
        assert!(matches!(classify("{not json"), Err(Error::Protocol(_))));
        assert!(matches!(
            classify(r#"{"data":[1]}"#),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn subscribe_without_replay_requires_connection() {
        let hub = hub(false);
        let counter = Arc::new(AtomicUsize::new(0));
        let err = hub
            .subscribe(&[Subscription::public("tickers", "BTC-USDT")], counting_handler(&counter))
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(hub.subscriptions().is_empty());
    }

    #[test]
    fn subscribe_with_replay_is_recorded_while_disconnected() {
        let hub = hub(true);
        let counter = Arc::new(AtomicUsize::new(0));
        hub.subscribe(
            &[
                Subscription::public("tickers", "BTC-USDT"),
                Subscription::public("tickers", "ETH-USDT"),
                Subscription::private("orders"),
            ],
            counting_handler(&counter),
        )
        .unwrap();
        assert_eq!(hub.subscriptions().len(), 3);
        assert_eq!(hub.inner.recorded_args(Endpoint::Public).len(), 2);
    }

    #[test]
    fn handler_registered_once_per_channel() {
        let hub = hub(true);
        let counter = Arc::new(AtomicUsize::new(0));
        hub.subscribe(
            &[
                Subscription::public("tickers", "BTC-USDT"),
                Subscription::public("tickers", "ETH-USDT"),
            ],
            counting_handler(&counter),
        )
        .unwrap();

        hub.dispatch(&StreamFrame {
            channel: "tickers".into(),
            inst_id: Some("BTC-USDT".into()),
            data: vec![],
        });
        hub.dispatch(&StreamFrame {
            channel: "books".into(),
            inst_id: Some("BTC-USDT".into()),
            data: vec![],
        });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_drops_handlers_of_empty_channel() {
        let hub = hub(true);
        let counter = Arc::new(AtomicUsize::new(0));
        let sub = Subscription::public("tickers", "BTC-USDT");
        hub.subscribe(std::slice::from_ref(&sub), counting_handler(&counter))
            .unwrap();
        hub.unsubscribe(std::slice::from_ref(&sub)).unwrap();

        hub.dispatch(&StreamFrame {
            channel: "tickers".into(),
            inst_id: None,
            data: vec![],
        });
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(hub.subscriptions().is_empty());
    }

    #[test]
    fn replay_frame_lists_recorded_args() {
        let hub = hub(true);
        let counter = Arc::new(AtomicUsize::new(0));
        hub.subscribe(
            &[Subscription::public("tickers", "BTC-USDT")],
            counting_handler(&counter),
        )
        .unwrap();
        let frame: Value =
            serde_json::from_str(&hub.inner.replay_frame(Endpoint::Public).unwrap()).unwrap();
        assert_eq!(frame["op"], "subscribe");
        assert_eq!(frame["args"][0]["channel"], "tickers");
        assert_eq!(frame["args"][0]["instId"], "BTC-USDT");
        assert!(hub.inner.replay_frame(Endpoint::Private).is_none());
    }

    #[tokio::test]
    async fn reconnect_during_delay_is_folded_into_it() {
        let wire = Wire::default();
        let hub = live_hub(&wire, Duration::from_millis(300)).await;
        hub.start();
        assert!(eventually(|| wire.handshakes() == 2 && hub.status().streams_up()).await);

        hub.reconnect();
        tokio::time::sleep(Duration::from_millis(100)).await;
        hub.reconnect();

        assert!(eventually(|| wire.handshakes() == 4 && hub.status().streams_up()).await);
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(wire.handshakes(), 4);
        assert!(hub.status().streams_up());
        hub.stop().await;
    }

    #[tokio::test]
    async fn server_ping_is_answered_with_pong() {
        let wire = Wire::default();
        wire.ping_first_public.store(true, Ordering::SeqCst);
        let hub = live_hub(&wire, Duration::from_millis(100)).await;
        hub.start();

        assert!(
            eventually(|| wire
                .frames(Endpoint::Public, 1)
                .iter()
                .any(|frame| frame["event"] == "pong"))
            .await
        );
        hub.stop().await;
    }

    #[tokio::test]
    async fn private_replay_waits_for_login_ack() {
        let wire = Wire::default();
        let hub = live_hub(&wire, Duration::from_millis(100)).await;
        let counter = Arc::new(AtomicUsize::new(0));
        hub.subscribe(
            &[
                Subscription::public("tickers", "BTC-USDT"),
                Subscription::private("orders"),
            ],
            counting_handler(&counter),
        )
        .unwrap();
        hub.start();

        assert!(eventually(|| !wire.frames(Endpoint::Private, 1).is_empty()).await);
        assert!(eventually(|| !wire.frames(Endpoint::Public, 1).is_empty()).await);
        let public = wire.frames(Endpoint::Public, 1);
        assert_eq!(public[0]["op"], "subscribe");
        assert_eq!(public[0]["args"][0]["instId"], "BTC-USDT");

        // No ack yet: the login frame stays the only private frame.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let private = wire.frames(Endpoint::Private, 1);
        assert_eq!(private.len(), 1);
        assert_eq!(private[0]["op"], "login");

        wire.ack_login.store(true, Ordering::SeqCst);
        hub.reconnect();
        assert!(eventually(|| wire.frames(Endpoint::Private, 2).len() >= 2).await);
        let private = wire.frames(Endpoint::Private, 2);
        assert_eq!(private[0]["op"], "login");
        assert_eq!(private[1]["op"], "subscribe");
        assert_eq!(private[1]["args"][0]["channel"], "orders");
        hub.stop().await;
    }

    #[tokio::test]
    async fn server_close_reopens_both_after_delay() {
        let wire = Wire::default();
        wire.close_first_public.store(true, Ordering::SeqCst);
        let delay = Duration::from_millis(300);
        let hub = live_hub(&wire, delay).await;
        hub.start();

        assert!(
            eventually(|| wire.opened_at(Endpoint::Public).len() == 2 && hub.status().streams_up())
                .await
        );
        let public = wire.opened_at(Endpoint::Public);
        assert!(public[1] - public[0] >= delay);
        hub.stop().await;
        assert!(!hub.status().streams_up());
    }
}
