//! Playback Continuity Manager - 客户端连续播放状态机
//!
//! 所有状态变化都发生在 handle() 里，按事件队列顺序串行执行:
//! - 外部事件: 打开、跳转、播放进度、播放结束、倍速、关闭
//! - 内部事件: 后台加载 / 预取任务完成（带 task_id，过期的直接丢弃）
//!
//! 同一时刻最多一个加载任务和一个预取任务，预取只针对当前章节的直接后继

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::events::{PlaybackEvent, PlayerCommand};
use super::state::{
    state_key, unit_elapsed_key, PlaybackPhase, PlaybackState, PrefetchSlot, PrefetchStatus,
};
use crate::application::error::PlaybackError;
use crate::application::ports::{DocumentSourcePort, StateStorePort, SynthesisPort};
use crate::domain::{strip_duplicate_heading, AudioArtifact, ContentUnit};

const MIN_PLAYBACK_RATE: f32 = 0.25;
const MAX_PLAYBACK_RATE: f32 = 4.0;

/// 播放管理器配置
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// 播放进度达到该比例时预取下一章
    pub prefetch_threshold: f64,
    /// 合成前去掉重复的章节标题行
    pub strip_duplicate_headings: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            prefetch_threshold: 0.8,
            strip_duplicate_headings: true,
        }
    }
}

struct CurrentUnit {
    unit_index: usize,
    elapsed_seconds: f64,
    duration_seconds: Option<f64>,
    ended: bool,
}

struct PendingLoad {
    unit_index: usize,
    task_id: u64,
    handle: JoinHandle<()>,
}

/// 读取章节文本并合成
async fn fetch_artifact(
    documents: Arc<dyn DocumentSourcePort>,
    synthesis: Arc<dyn SynthesisPort>,
    unit: ContentUnit,
    strip_headings: bool,
) -> Result<AudioArtifact, PlaybackError> {
    let text = documents.load_text(&unit).await?;
    let text = if strip_headings {
        strip_duplicate_heading(&text)
    } else {
        text
    };
    Ok(synthesis.synthesize_document(&text).await?)
}

/// 连续播放管理器
pub struct PlaybackContinuityManager {
    config: PlaybackConfig,
    documents: Arc<dyn DocumentSourcePort>,
    synthesis: Arc<dyn SynthesisPort>,
    store: Arc<dyn StateStorePort>,

    units: Vec<ContentUnit>,
    phase: PlaybackPhase,
    current: Option<CurrentUnit>,
    load: Option<PendingLoad>,
    prefetch: PrefetchSlot,
    playback_rate: f32,
    next_task_id: u64,

    events_tx: mpsc::UnboundedSender<PlaybackEvent>,
    events_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
}

impl PlaybackContinuityManager {
    pub fn new(
        config: PlaybackConfig,
        documents: Arc<dyn DocumentSourcePort>,
        synthesis: Arc<dyn SynthesisPort>,
        store: Arc<dyn StateStorePort>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            documents,
            synthesis,
            store,
            units: Vec::new(),
            phase: PlaybackPhase::Idle,
            current: None,
            load: None,
            prefetch: PrefetchSlot::Empty,
            playback_rate: 1.0,
            next_task_id: 0,
            events_tx,
            events_rx,
        }
    }

    /// 事件入口（播放器回调、UI 操作都从这里进）
    pub fn sender(&self) -> mpsc::UnboundedSender<PlaybackEvent> {
        self.events_tx.clone()
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn units(&self) -> &[ContentUnit] {
        &self.units
    }

    pub fn current_unit(&self) -> Option<&ContentUnit> {
        self.current
            .as_ref()
            .and_then(|c| self.units.get(c.unit_index))
    }

    pub fn elapsed_seconds(&self) -> Option<f64> {
        self.current.as_ref().map(|c| c.elapsed_seconds)
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    pub fn prefetch_status(&self) -> PrefetchStatus {
        let id = |index: &usize| {
            self.units
                .get(*index)
                .map(|u| u.id.clone())
                .unwrap_or_default()
        };
        match &self.prefetch {
            PrefetchSlot::Empty => PrefetchStatus::Empty,
            PrefetchSlot::Pending { unit_index, .. } => PrefetchStatus::Pending(id(unit_index)),
            PrefetchSlot::Ready { unit_index, .. } => PrefetchStatus::Ready(id(unit_index)),
            PrefetchSlot::Failed { unit_index } => PrefetchStatus::Failed(id(unit_index)),
        }
    }

    /// 某章节上次记录的播放位置
    pub async fn saved_unit_elapsed(&self, unit_id: &str) -> Option<f64> {
        let key = unit_elapsed_key(self.documents.document_id(), unit_id);
        match self.store.get(&key).await {
            Ok(value) => value.and_then(|v| v.parse().ok()),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read unit progress");
                None
            }
        }
    }

    /// 处理一个事件，返回需要播放器执行的命令
    pub async fn handle(&mut self, event: PlaybackEvent) -> Vec<PlayerCommand> {
        match event {
            PlaybackEvent::Open { selected_unit_id } => self.open(selected_unit_id).await,
            PlaybackEvent::Navigate { unit_id } => self.navigate(&unit_id),
            PlaybackEvent::TimeUpdate {
                elapsed_seconds,
                duration_seconds,
            } => self.time_update(elapsed_seconds, duration_seconds).await,
            PlaybackEvent::Ended => self.ended().await,
            PlaybackEvent::SetPlaybackRate(rate) => self.set_rate(rate).await,
            PlaybackEvent::Close => self.close(),
            PlaybackEvent::LoadCompleted {
                task_id,
                unit_index,
                start_at_seconds,
                result,
            } => {
                if !self.load.as_ref().is_some_and(|l| l.task_id == task_id) {
                    tracing::debug!(task_id, "Ignoring stale load completion");
                    return Vec::new();
                }
                self.load = None;
                self.finish_load(unit_index, start_at_seconds, result).await
            }
            PlaybackEvent::PrefetchCompleted {
                task_id,
                unit_index,
                result,
            } => self.prefetch_completed(task_id, unit_index, result).await,
        }
    }

    /// 取出并处理下一个排队事件
    pub async fn step(&mut self) -> Option<Vec<PlayerCommand>> {
        let event = self.events_rx.recv().await?;
        Some(self.handle(event).await)
    }

    /// 事件循环，命令转发给播放器；shutdown 触发时关闭会话并退出
    pub async fn run(mut self, player: mpsc::Sender<PlayerCommand>, shutdown: CancellationToken) {
        loop {
            let (event, stopping) = tokio::select! {
                biased;
                _ = shutdown.cancelled() => (PlaybackEvent::Close, true),
                event = self.events_rx.recv() => match event {
                    Some(event) => (event, false),
                    None => (PlaybackEvent::Close, true),
                },
            };

            for command in self.handle(event).await {
                if player.send(command).await.is_err() {
                    tracing::debug!("Player channel closed, stopping playback loop");
                    self.reset();
                    return;
                }
            }

            if stopping {
                tracing::info!("Playback loop stopped");
                return;
            }
        }
    }

    async fn open(&mut self, selected_unit_id: Option<String>) -> Vec<PlayerCommand> {
        self.reset();
        self.units.clear();

        let units = match self.documents.list_content_units().await {
            Ok(units) if units.is_empty() => {
                return self.fail(String::new(), PlaybackError::NoContentUnits)
            }
            Ok(units) => units,
            Err(e) => return self.fail(String::new(), e.into()),
        };
        self.units = units;

        let saved = self.read_state().await;
        if let Some(saved) = &saved {
            self.playback_rate = saved.playback_rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
        }
        let saved_index = saved
            .as_ref()
            .and_then(|s| self.index_of(&s.current_unit_id));

        let target = match selected_unit_id {
            Some(unit_id) => match self.index_of(&unit_id) {
                Some(index) => index,
                None => return self.fail(unit_id.clone(), PlaybackError::UnknownUnit(unit_id)),
            },
            None => saved_index.unwrap_or(0),
        };

        // 只有打开的正是上次播放的章节才恢复进度
        let start_at_seconds = match (&saved, saved_index) {
            (Some(saved), Some(index)) if index == target => saved.elapsed_seconds.max(0.0),
            _ => 0.0,
        };

        tracing::info!(
            document_id = %self.documents.document_id(),
            unit_id = %self.units[target].id,
            start_at_seconds,
            units = self.units.len(),
            "Opening document"
        );

        self.begin_load(target, start_at_seconds);
        Vec::new()
    }

    fn navigate(&mut self, unit_id: &str) -> Vec<PlayerCommand> {
        let Some(index) = self.index_of(unit_id) else {
            return self.fail(
                unit_id.to_string(),
                PlaybackError::UnknownUnit(unit_id.to_string()),
            );
        };

        tracing::info!(unit_id = %unit_id, "Navigating to unit");
        self.discard_prefetch();
        self.begin_load(index, 0.0);
        Vec::new()
    }

    async fn time_update(
        &mut self,
        elapsed_seconds: f64,
        duration_seconds: f64,
    ) -> Vec<PlayerCommand> {
        if self.phase != PlaybackPhase::Playing
            || !elapsed_seconds.is_finite()
            || elapsed_seconds < 0.0
        {
            return Vec::new();
        }
        let Some(current) = self.current.as_mut() else {
            return Vec::new();
        };

        current.elapsed_seconds = elapsed_seconds;
        if duration_seconds.is_finite() && duration_seconds > 0.0 {
            current.duration_seconds = Some(duration_seconds);
        }
        let unit_index = current.unit_index;

        self.persist(unit_index, elapsed_seconds).await;
        self.maybe_prefetch();
        Vec::new()
    }

    async fn ended(&mut self) -> Vec<PlayerCommand> {
        if self.phase != PlaybackPhase::Playing {
            return Vec::new();
        }
        let Some(current) = self.current.as_mut() else {
            return Vec::new();
        };
        current.ended = true;
        if let Some(duration) = current.duration_seconds {
            current.elapsed_seconds = duration;
        }

        let next = current.unit_index + 1;
        if next >= self.units.len() {
            tracing::info!("Reached end of document");
            self.phase = PlaybackPhase::Finished;
            return vec![PlayerCommand::Finished];
        }

        self.phase = PlaybackPhase::Transitioning;
        match std::mem::replace(&mut self.prefetch, PrefetchSlot::Empty) {
            PrefetchSlot::Ready {
                unit_index,
                artifact,
            } if unit_index == next => {
                tracing::info!(unit_id = %self.units[next].id, "Transitioning to prefetched unit");
                self.start_playing(next, artifact, 0.0).await
            }
            PrefetchSlot::Pending {
                unit_index,
                task_id,
                handle,
            } if unit_index == next => {
                tracing::info!(unit_id = %self.units[next].id, "Waiting for in-flight prefetch");
                self.load = Some(PendingLoad {
                    unit_index,
                    task_id,
                    handle,
                });
                self.phase = PlaybackPhase::Loading;
                Vec::new()
            }
            other => {
                if let PrefetchSlot::Pending { handle, .. } = other {
                    handle.abort();
                }
                tracing::info!(
                    unit_id = %self.units[next].id,
                    "No prefetched audio, loading on demand"
                );
                self.begin_load(next, 0.0);
                Vec::new()
            }
        }
    }

    async fn set_rate(&mut self, rate: f32) -> Vec<PlayerCommand> {
        if !rate.is_finite() {
            return Vec::new();
        }
        self.playback_rate = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);

        if let Some((unit_index, elapsed)) = self
            .current
            .as_ref()
            .map(|c| (c.unit_index, c.elapsed_seconds))
        {
            self.persist(unit_index, elapsed).await;
        }
        vec![PlayerCommand::SetRate(self.playback_rate)]
    }

    fn close(&mut self) -> Vec<PlayerCommand> {
        self.reset();
        self.units.clear();
        tracing::info!("Playback session closed");
        vec![PlayerCommand::Stop]
    }

    async fn prefetch_completed(
        &mut self,
        task_id: u64,
        unit_index: usize,
        result: Result<AudioArtifact, PlaybackError>,
    ) -> Vec<PlayerCommand> {
        let in_slot =
            matches!(&self.prefetch, PrefetchSlot::Pending { task_id: t, .. } if *t == task_id);
        if in_slot {
            self.prefetch = match result {
                Ok(artifact) => {
                    tracing::info!(
                        unit_id = %self.units[unit_index].id,
                        audio_size = artifact.len(),
                        "Prefetch ready"
                    );
                    PrefetchSlot::Ready {
                        unit_index,
                        artifact: Arc::new(artifact),
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        unit_id = %self.units[unit_index].id,
                        error = %e,
                        "Prefetch failed, next unit will load on demand"
                    );
                    PrefetchSlot::Failed { unit_index }
                }
            };
            return Vec::new();
        }

        // 播放结束时被接管为加载任务的预取
        if self.load.as_ref().is_some_and(|l| l.task_id == task_id) {
            self.load = None;
            return self.finish_load(unit_index, 0.0, result).await;
        }

        tracing::debug!(task_id, "Ignoring stale prefetch completion");
        Vec::new()
    }

    async fn finish_load(
        &mut self,
        unit_index: usize,
        start_at_seconds: f64,
        result: Result<AudioArtifact, PlaybackError>,
    ) -> Vec<PlayerCommand> {
        match result {
            Ok(artifact) => {
                self.start_playing(unit_index, Arc::new(artifact), start_at_seconds)
                    .await
            }
            Err(e) => {
                // 当前播放（若还在播）不受影响
                self.phase = match &self.current {
                    Some(current) if !current.ended => PlaybackPhase::Playing,
                    _ => PlaybackPhase::Idle,
                };
                let unit_id = self.units[unit_index].id.clone();
                self.fail(unit_id, e)
            }
        }
    }

    async fn start_playing(
        &mut self,
        unit_index: usize,
        artifact: Arc<AudioArtifact>,
        start_at_seconds: f64,
    ) -> Vec<PlayerCommand> {
        self.current = Some(CurrentUnit {
            unit_index,
            elapsed_seconds: start_at_seconds,
            duration_seconds: artifact
                .duration_ms
                .map(|ms| ms as f64 / 1000.0)
                .filter(|d| *d > 0.0),
            ended: false,
        });
        self.phase = PlaybackPhase::Playing;

        // 槽里只能是新当前章节的直接后继
        if self
            .prefetch
            .unit_index()
            .is_some_and(|index| index != unit_index + 1)
        {
            self.discard_prefetch();
        }

        self.persist(unit_index, start_at_seconds).await;

        vec![PlayerCommand::Play {
            unit: self.units[unit_index].clone(),
            artifact,
            start_at_seconds,
            playback_rate: self.playback_rate,
        }]
    }

    fn maybe_prefetch(&mut self) {
        let Some((unit_index, elapsed, duration)) = self
            .current
            .as_ref()
            .and_then(|c| c.duration_seconds.map(|d| (c.unit_index, c.elapsed_seconds, d)))
        else {
            return;
        };

        if elapsed / duration < self.config.prefetch_threshold {
            return;
        }
        let next = unit_index + 1;
        if next >= self.units.len() || !matches!(self.prefetch, PrefetchSlot::Empty) {
            return;
        }

        tracing::info!(
            unit_id = %self.units[next].id,
            progress = elapsed / duration,
            "Prefetching next unit"
        );
        let (task_id, handle) = self.spawn_fetch(next, move |task_id, result| {
            PlaybackEvent::PrefetchCompleted {
                task_id,
                unit_index: next,
                result,
            }
        });
        self.prefetch = PrefetchSlot::Pending {
            unit_index: next,
            task_id,
            handle,
        };
    }

    fn begin_load(&mut self, unit_index: usize, start_at_seconds: f64) {
        self.cancel_load();
        let (task_id, handle) = self.spawn_fetch(unit_index, move |task_id, result| {
            PlaybackEvent::LoadCompleted {
                task_id,
                unit_index,
                start_at_seconds,
                result,
            }
        });
        self.load = Some(PendingLoad {
            unit_index,
            task_id,
            handle,
        });
        self.phase = PlaybackPhase::Loading;
    }

    fn spawn_fetch<F>(&mut self, unit_index: usize, into_event: F) -> (u64, JoinHandle<()>)
    where
        F: FnOnce(u64, Result<AudioArtifact, PlaybackError>) -> PlaybackEvent + Send + 'static,
    {
        self.next_task_id += 1;
        let task_id = self.next_task_id;

        let documents = self.documents.clone();
        let synthesis = self.synthesis.clone();
        let unit = self.units[unit_index].clone();
        let strip_headings = self.config.strip_duplicate_headings;
        let events_tx = self.events_tx.clone();

        let handle = tokio::spawn(async move {
            let result = fetch_artifact(documents, synthesis, unit, strip_headings).await;
            // 管理器已销毁时发送失败，忽略
            let _ = events_tx.send(into_event(task_id, result));
        });

        (task_id, handle)
    }

    fn cancel_load(&mut self) {
        if let Some(load) = self.load.take() {
            tracing::debug!(
                task_id = load.task_id,
                unit_index = load.unit_index,
                "Cancelling pending load"
            );
            load.handle.abort();
        }
    }

    fn discard_prefetch(&mut self) {
        match std::mem::replace(&mut self.prefetch, PrefetchSlot::Empty) {
            PrefetchSlot::Pending {
                task_id, handle, ..
            } => {
                tracing::debug!(task_id, "Cancelling pending prefetch");
                handle.abort();
            }
            PrefetchSlot::Empty => {}
            _ => tracing::debug!("Discarding prefetched unit"),
        }
    }

    /// 取消所有后台任务并回到 Idle
    fn reset(&mut self) {
        self.cancel_load();
        self.discard_prefetch();
        self.current = None;
        self.phase = PlaybackPhase::Idle;
    }

    fn fail(&self, unit_id: String, error: PlaybackError) -> Vec<PlayerCommand> {
        tracing::warn!(unit_id = %unit_id, error = %error, "Failed to load unit");
        vec![PlayerCommand::Failed {
            unit_id,
            message: error.to_string(),
        }]
    }

    fn index_of(&self, unit_id: &str) -> Option<usize> {
        self.units.iter().position(|u| u.id == unit_id)
    }

    async fn read_state(&self) -> Option<PlaybackState> {
        let key = state_key(self.documents.document_id());
        match self.store.get(&key).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Ignoring unreadable playback state");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read playback state");
                None
            }
        }
    }

    /// 保存进度（last-write-wins，失败只记录日志）
    async fn persist(&self, unit_index: usize, elapsed_seconds: f64) {
        let document_id = self.documents.document_id();
        let unit_id = &self.units[unit_index].id;
        let state = PlaybackState {
            current_unit_id: unit_id.clone(),
            elapsed_seconds,
            playback_rate: self.playback_rate,
            updated_at: chrono::Utc::now(),
        };

        match serde_json::to_string(&state) {
            Ok(json) => {
                if let Err(e) = self.store.set(&state_key(document_id), json).await {
                    tracing::warn!(error = %e, "Failed to persist playback state");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize playback state"),
        }

        if let Err(e) = self
            .store
            .set(
                &unit_elapsed_key(document_id, unit_id),
                elapsed_seconds.to_string(),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to persist unit progress");
        }
    }
}

impl Drop for PlaybackContinuityManager {
    fn drop(&mut self) {
        self.cancel_load();
        self.discard_prefetch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::SynthesisError;
    use crate::domain::AudioFormat;
    use crate::infrastructure::adapters::document::InMemoryDocumentSource;
    use crate::infrastructure::memory::InMemoryStateStore;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// 可以按文本阻塞或失败的合成端口
    #[derive(Default)]
    struct ScriptedSynthesis {
        calls: Mutex<Vec<String>>,
        gates: DashMap<String, Arc<Notify>>,
        failing: DashMap<String, ()>,
    }

    impl ScriptedSynthesis {
        fn gate(&self, text: &str) -> Arc<Notify> {
            self.gates
                .entry(text.to_string())
                .or_insert_with(|| Arc::new(Notify::new()))
                .clone()
        }

        fn fail(&self, text: &str) {
            self.failing.insert(text.to_string(), ());
        }

        fn calls_for(&self, text: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.as_str() == text)
                .count()
        }
    }

    #[async_trait]
    impl SynthesisPort for ScriptedSynthesis {
        async fn synthesize_document(&self, text: &str) -> Result<AudioArtifact, SynthesisError> {
            self.calls.lock().unwrap().push(text.to_string());
            let gate = self.gates.get(text).map(|g| g.clone());
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if self.failing.contains_key(text) {
                return Err(SynthesisError::Unavailable("scripted failure".to_string()));
            }
            Ok(AudioArtifact {
                audio_data: text.as_bytes().to_vec(),
                format: AudioFormat::Mp3,
                duration_ms: Some(100_000),
                chunk_count: 1,
            })
        }
    }

    struct Harness {
        manager: PlaybackContinuityManager,
        synthesis: Arc<ScriptedSynthesis>,
        store: Arc<InMemoryStateStore>,
    }

    fn book() -> InMemoryDocumentSource {
        InMemoryDocumentSource::new("book")
            .with_unit("u1", "One", "text one")
            .with_unit("u2", "Two", "text two")
            .with_unit("u3", "Three", "text three")
    }

    fn harness_with(documents: InMemoryDocumentSource, config: PlaybackConfig) -> Harness {
        let synthesis = Arc::new(ScriptedSynthesis::default());
        let store = Arc::new(InMemoryStateStore::new());
        let manager = PlaybackContinuityManager::new(
            config,
            Arc::new(documents),
            synthesis.clone(),
            store.clone(),
        );
        Harness {
            manager,
            synthesis,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(
            book(),
            PlaybackConfig {
                prefetch_threshold: 0.8,
                strip_duplicate_headings: false,
            },
        )
    }

    fn open(selected: Option<&str>) -> PlaybackEvent {
        PlaybackEvent::Open {
            selected_unit_id: selected.map(str::to_string),
        }
    }

    fn tick(elapsed_seconds: f64) -> PlaybackEvent {
        PlaybackEvent::TimeUpdate {
            elapsed_seconds,
            duration_seconds: 100.0,
        }
    }

    async fn next(manager: &mut PlaybackContinuityManager) -> Vec<PlayerCommand> {
        tokio::time::timeout(Duration::from_secs(5), manager.step())
            .await
            .expect("no internal event arrived")
            .expect("event channel closed")
    }

    async fn assert_quiet(manager: &mut PlaybackContinuityManager) {
        let result = tokio::time::timeout(Duration::from_millis(50), manager.step()).await;
        assert!(result.is_err(), "unexpected internal event");
    }

    fn played(commands: &[PlayerCommand]) -> (String, f64, f32, Vec<u8>) {
        match commands {
            [PlayerCommand::Play {
                unit,
                artifact,
                start_at_seconds,
                playback_rate,
            }] => (
                unit.id.clone(),
                *start_at_seconds,
                *playback_rate,
                artifact.audio_data.clone(),
            ),
            other => panic!("expected a single Play, got {other:?}"),
        }
    }

    async fn saved_state(store: &InMemoryStateStore) -> PlaybackState {
        let json = store.get("playback:book").await.unwrap().expect("state saved");
        serde_json::from_str(&json).unwrap()
    }

    async fn seed_state(store: &InMemoryStateStore, unit_id: &str, elapsed: f64, rate: f32) {
        let state = PlaybackState {
            current_unit_id: unit_id.to_string(),
            elapsed_seconds: elapsed,
            playback_rate: rate,
            updated_at: chrono::Utc::now(),
        };
        store
            .set("playback:book", serde_json::to_string(&state).unwrap())
            .await
            .unwrap();
    }

    async fn open_playing(h: &mut Harness, selected: Option<&str>) -> (String, f64, f32, Vec<u8>) {
        assert!(h.manager.handle(open(selected)).await.is_empty());
        assert_eq!(h.manager.phase(), PlaybackPhase::Loading);
        played(&next(&mut h.manager).await)
    }

    #[tokio::test]
    async fn test_open_without_state_starts_first_unit() {
        let mut h = harness();

        let (unit_id, start_at, rate, audio) = open_playing(&mut h, None).await;

        assert_eq!(unit_id, "u1");
        assert_eq!(start_at, 0.0);
        assert_eq!(rate, 1.0);
        assert_eq!(audio, b"text one");
        assert_eq!(h.manager.phase(), PlaybackPhase::Playing);
        assert_eq!(saved_state(&h.store).await.current_unit_id, "u1");
    }

    #[tokio::test]
    async fn test_resume_restores_elapsed_only_for_saved_unit() {
        let mut h = harness();
        seed_state(&h.store, "u2", 42.0, 1.25).await;

        let (unit_id, start_at, rate, _) = open_playing(&mut h, None).await;
        assert_eq!((unit_id.as_str(), start_at, rate), ("u2", 42.0, 1.25));

        let (unit_id, start_at, _, _) = open_playing(&mut h, Some("u2")).await;
        assert_eq!((unit_id.as_str(), start_at), ("u2", 42.0));

        let (unit_id, start_at, _, _) = open_playing(&mut h, Some("u3")).await;
        assert_eq!((unit_id.as_str(), start_at), ("u3", 0.0));
    }

    #[tokio::test]
    async fn test_prefetch_starts_once_past_threshold() {
        let mut h = harness();
        open_playing(&mut h, None).await;

        h.manager.handle(tick(50.0)).await;
        assert_eq!(h.manager.prefetch_status(), PrefetchStatus::Empty);

        h.manager.handle(tick(80.0)).await;
        assert_eq!(
            h.manager.prefetch_status(),
            PrefetchStatus::Pending("u2".to_string())
        );
        h.manager.handle(tick(85.0)).await;
        h.manager.handle(tick(90.0)).await;

        assert!(next(&mut h.manager).await.is_empty());
        assert_eq!(
            h.manager.prefetch_status(),
            PrefetchStatus::Ready("u2".to_string())
        );

        h.manager.handle(tick(95.0)).await;
        assert_quiet(&mut h.manager).await;
        assert_eq!(h.synthesis.calls_for("text two"), 1);
    }

    #[tokio::test]
    async fn test_ended_with_ready_prefetch_plays_immediately() {
        let mut h = harness();
        open_playing(&mut h, None).await;
        h.manager.handle(tick(90.0)).await;
        next(&mut h.manager).await;

        let commands = h.manager.handle(PlaybackEvent::Ended).await;
        let (unit_id, start_at, _, audio) = played(&commands);

        assert_eq!(unit_id, "u2");
        assert_eq!(start_at, 0.0);
        assert_eq!(audio, b"text two");
        assert_eq!(h.manager.phase(), PlaybackPhase::Playing);
        assert_eq!(h.manager.elapsed_seconds(), Some(0.0));
        assert_eq!(h.manager.prefetch_status(), PrefetchStatus::Empty);

        let state = saved_state(&h.store).await;
        assert_eq!(state.current_unit_id, "u2");
        assert_eq!(state.elapsed_seconds, 0.0);

        // 新章节重新计算阈值
        h.manager.handle(tick(10.0)).await;
        assert_eq!(h.manager.prefetch_status(), PrefetchStatus::Empty);
        h.manager.handle(tick(85.0)).await;
        assert_eq!(
            h.manager.prefetch_status(),
            PrefetchStatus::Pending("u3".to_string())
        );
        assert_eq!(h.synthesis.calls_for("text two"), 1);
    }

    #[tokio::test]
    async fn test_ended_with_pending_prefetch_adopts_it() {
        let mut h = harness();
        let gate = h.synthesis.gate("text two");
        open_playing(&mut h, None).await;
        h.manager.handle(tick(90.0)).await;

        assert!(h.manager.handle(PlaybackEvent::Ended).await.is_empty());
        assert_eq!(h.manager.phase(), PlaybackPhase::Loading);
        assert_eq!(h.manager.prefetch_status(), PrefetchStatus::Empty);

        gate.notify_one();
        let (unit_id, start_at, _, _) = played(&next(&mut h.manager).await);
        assert_eq!((unit_id.as_str(), start_at), ("u2", 0.0));
        assert_eq!(h.synthesis.calls_for("text two"), 1);
    }

    #[tokio::test]
    async fn test_navigation_cancels_prefetch() {
        let mut h = harness();
        let gate = h.synthesis.gate("text two");
        open_playing(&mut h, None).await;
        h.manager.handle(tick(90.0)).await;
        assert_eq!(
            h.manager.prefetch_status(),
            PrefetchStatus::Pending("u2".to_string())
        );

        assert!(h
            .manager
            .handle(PlaybackEvent::Navigate {
                unit_id: "u3".to_string()
            })
            .await
            .is_empty());
        assert_eq!(h.manager.prefetch_status(), PrefetchStatus::Empty);

        let (unit_id, start_at, _, _) = played(&next(&mut h.manager).await);
        assert_eq!((unit_id.as_str(), start_at), ("u3", 0.0));

        // 被取消的预取即使放行也不会回来
        gate.notify_one();
        assert_quiet(&mut h.manager).await;
        assert_eq!(h.manager.prefetch_status(), PrefetchStatus::Empty);
        assert_eq!(saved_state(&h.store).await.current_unit_id, "u3");
    }

    #[tokio::test]
    async fn test_stale_completions_are_ignored() {
        let mut h = harness();
        open_playing(&mut h, None).await;
        let before = saved_state(&h.store).await;

        let artifact = AudioArtifact {
            audio_data: b"stale".to_vec(),
            format: AudioFormat::Mp3,
            duration_ms: None,
            chunk_count: 1,
        };
        let commands = h
            .manager
            .handle(PlaybackEvent::PrefetchCompleted {
                task_id: 999,
                unit_index: 1,
                result: Ok(artifact.clone()),
            })
            .await;
        assert!(commands.is_empty());
        assert_eq!(h.manager.prefetch_status(), PrefetchStatus::Empty);

        let commands = h
            .manager
            .handle(PlaybackEvent::LoadCompleted {
                task_id: 998,
                unit_index: 2,
                start_at_seconds: 0.0,
                result: Ok(artifact),
            })
            .await;
        assert!(commands.is_empty());
        assert_eq!(h.manager.current_unit().unwrap().id, "u1");
        assert_eq!(saved_state(&h.store).await, before);
    }

    #[tokio::test]
    async fn test_failed_prefetch_falls_back_to_on_demand() {
        let mut h = harness();
        h.synthesis.fail("text two");
        open_playing(&mut h, None).await;

        h.manager.handle(tick(90.0)).await;
        assert!(next(&mut h.manager).await.is_empty());
        assert_eq!(
            h.manager.prefetch_status(),
            PrefetchStatus::Failed("u2".to_string())
        );

        // 失败后不会每个 tick 都重试
        h.manager.handle(tick(95.0)).await;
        assert_quiet(&mut h.manager).await;
        assert_eq!(h.synthesis.calls_for("text two"), 1);

        assert!(h.manager.handle(PlaybackEvent::Ended).await.is_empty());
        assert_eq!(h.manager.phase(), PlaybackPhase::Loading);

        let commands = next(&mut h.manager).await;
        assert!(matches!(
            commands.as_slice(),
            [PlayerCommand::Failed { unit_id, .. }] if unit_id == "u2"
        ));
        assert_eq!(h.synthesis.calls_for("text two"), 2);
        assert_eq!(h.manager.phase(), PlaybackPhase::Idle);
        assert_eq!(saved_state(&h.store).await.current_unit_id, "u1");
    }

    #[tokio::test]
    async fn test_failed_open_keeps_saved_state() {
        let mut h = harness();
        seed_state(&h.store, "u2", 42.0, 1.0).await;
        let before = h.store.get("playback:book").await.unwrap();
        h.synthesis.fail("text two");

        h.manager.handle(open(None)).await;
        let commands = next(&mut h.manager).await;

        assert!(matches!(commands.as_slice(), [PlayerCommand::Failed { .. }]));
        assert_eq!(h.manager.phase(), PlaybackPhase::Idle);
        assert_eq!(h.store.get("playback:book").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_failed_navigation_keeps_current_playback() {
        let mut h = harness();
        h.synthesis.fail("text three");
        open_playing(&mut h, None).await;

        h.manager
            .handle(PlaybackEvent::Navigate {
                unit_id: "u3".to_string(),
            })
            .await;
        let commands = next(&mut h.manager).await;

        assert!(matches!(commands.as_slice(), [PlayerCommand::Failed { .. }]));
        assert_eq!(h.manager.phase(), PlaybackPhase::Playing);
        assert_eq!(h.manager.current_unit().unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_unknown_unit_is_reported() {
        let mut h = harness();
        let commands = h.manager.handle(open(Some("missing"))).await;
        assert!(matches!(
            commands.as_slice(),
            [PlayerCommand::Failed { unit_id, .. }] if unit_id == "missing"
        ));
        assert_eq!(h.manager.phase(), PlaybackPhase::Idle);
    }

    #[tokio::test]
    async fn test_last_unit_finishes() {
        let mut h = harness();
        open_playing(&mut h, Some("u3")).await;
        h.manager.handle(tick(99.0)).await;
        assert_eq!(h.manager.prefetch_status(), PrefetchStatus::Empty);

        let commands = h.manager.handle(PlaybackEvent::Ended).await;
        assert_eq!(commands, vec![PlayerCommand::Finished]);
        assert_eq!(h.manager.phase(), PlaybackPhase::Finished);
    }

    #[tokio::test]
    async fn test_time_update_persists_progress() {
        let mut h = harness();
        open_playing(&mut h, None).await;

        h.manager.handle(tick(33.5)).await;

        let state = saved_state(&h.store).await;
        assert_eq!(state.current_unit_id, "u1");
        assert_eq!(state.elapsed_seconds, 33.5);
        assert_eq!(h.manager.saved_unit_elapsed("u1").await, Some(33.5));
        assert_eq!(h.manager.saved_unit_elapsed("u2").await, None);
    }

    #[tokio::test]
    async fn test_rate_change_is_clamped_and_persisted() {
        let mut h = harness();
        open_playing(&mut h, None).await;

        let commands = h.manager.handle(PlaybackEvent::SetPlaybackRate(1.5)).await;
        assert_eq!(commands, vec![PlayerCommand::SetRate(1.5)]);
        assert_eq!(saved_state(&h.store).await.playback_rate, 1.5);

        let commands = h.manager.handle(PlaybackEvent::SetPlaybackRate(10.0)).await;
        assert_eq!(commands, vec![PlayerCommand::SetRate(MAX_PLAYBACK_RATE)]);
    }

    #[tokio::test]
    async fn test_close_aborts_background_work() {
        let mut h = harness();
        let gate = h.synthesis.gate("text two");
        open_playing(&mut h, None).await;
        h.manager.handle(tick(90.0)).await;

        let commands = h.manager.handle(PlaybackEvent::Close).await;
        assert_eq!(commands, vec![PlayerCommand::Stop]);
        assert_eq!(h.manager.phase(), PlaybackPhase::Idle);
        assert_eq!(h.manager.prefetch_status(), PrefetchStatus::Empty);
        assert!(h.manager.current_unit().is_none());

        gate.notify_one();
        assert_quiet(&mut h.manager).await;
    }

    #[tokio::test]
    async fn test_duplicate_headings_stripped_before_synthesis() {
        let documents = InMemoryDocumentSource::new("book")
            .with_unit("c1", "Chapter 1", "Chapter 1\nIt begins.");
        let mut h = harness_with(documents, PlaybackConfig::default());

        let (_, _, _, audio) = open_playing(&mut h, None).await;
        assert_eq!(audio, b"It begins.");
    }

    #[tokio::test]
    async fn test_run_loop_forwards_commands() {
        let h = harness();
        let events = h.manager.sender();
        let (player_tx, mut player_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(h.manager.run(player_tx, shutdown.clone()));

        events.send(open(None)).unwrap();
        let command = tokio::time::timeout(Duration::from_secs(5), player_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(command, PlayerCommand::Play { ref unit, .. } if unit.id == "u1"));

        shutdown.cancel();
        let command = player_rx.recv().await.unwrap();
        assert_eq!(command, PlayerCommand::Stop);
        task.await.unwrap();
    }
}
