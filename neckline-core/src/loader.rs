//! Background asset loading and the latest-frame slot.
//!
//! Decoding runs on tokio's blocking pool; results come back over a channel
//! and are folded into the [`OverlayState`] on the owning thread, where the
//! request ticket decides whether they still matter.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::asset::{load_selection, AssetCatalog, AssetStore, LoadedAsset, OverlaySelection};
use crate::error::LoadError;
use crate::overlay::{ApplyOutcome, FrameInput, LoadTicket, OverlayState};

/// A finished load, successful or not
#[derive(Debug)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub result: Result<LoadedAsset, LoadError>,
}

/// Runs asset loads off the frame thread
pub struct AssetLoader {
    store: Arc<dyn AssetStore>,
    catalog: Arc<AssetCatalog>,
    handle: Handle,
    tx: mpsc::UnboundedSender<LoadCompletion>,
    rx: mpsc::UnboundedReceiver<LoadCompletion>,
}

impl AssetLoader {
    pub fn new(store: Arc<dyn AssetStore>, catalog: Arc<AssetCatalog>, handle: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            store,
            catalog,
            handle,
            tx,
            rx,
        }
    }

    /// Loader bound to the runtime the caller is running on
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current(store: Arc<dyn AssetStore>, catalog: Arc<AssetCatalog>) -> Self {
        Self::new(store, catalog, Handle::current())
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    /// Select an asset and start loading it in the background
    pub fn request(
        &self,
        state: &mut OverlayState,
        selection: OverlaySelection,
    ) -> Option<LoadTicket> {
        let ticket = state.select(selection)?;
        self.spawn(ticket.clone());
        Some(ticket)
    }

    /// Start loading the asset a ticket names
    pub fn spawn(&self, ticket: LoadTicket) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let catalog = Arc::clone(&self.catalog);
        let tx = self.tx.clone();

        self.handle.spawn_blocking(move || {
            let result = load_selection(store.as_ref(), &catalog, ticket.selection());
            if tx.send(LoadCompletion { ticket, result }).is_err() {
                debug!("Loader dropped before the load finished");
            }
        })
    }

    /// Hand every finished load to `state` without waiting.
    ///
    /// Returns how many became the current asset; failed and superseded
    /// loads are not counted.
    pub fn drain_into(&mut self, state: &mut OverlayState) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            if state.apply_load(completion.ticket, completion.result) == ApplyOutcome::Applied {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next finished load
    pub async fn next_completion(&mut self) -> Option<LoadCompletion> {
        self.rx.recv().await
    }
}

/// Producer half of the latest-frame slot
#[derive(Debug, Clone)]
pub struct FramePublisher {
    tx: Arc<watch::Sender<Option<FrameInput>>>,
}

/// Consumer half of the latest-frame slot; intermediate frames are skipped
#[derive(Debug, Clone)]
pub struct FrameSubscriber {
    rx: watch::Receiver<Option<FrameInput>>,
}

/// A single-slot frame channel where newer frames replace unread ones
pub fn frame_feed() -> (FramePublisher, FrameSubscriber) {
    let (tx, rx) = watch::channel(None);
    (FramePublisher { tx: Arc::new(tx) }, FrameSubscriber { rx })
}

impl FramePublisher {
    pub fn publish(&self, frame: FrameInput) {
        self.tx.send_replace(Some(frame));
    }
}

impl FrameSubscriber {
    /// The newest unread frame, if one arrived since the last call.
    ///
    /// A frame published just before the last publisher went away is still
    /// delivered.
    pub fn take_latest(&mut self) -> Option<FrameInput> {
        let frame = self.rx.borrow_and_update();
        if frame.has_changed() {
            (*frame).clone()
        } else {
            None
        }
    }

    /// Wait for a new frame; `None` once every publisher is gone
    pub async fn next(&mut self) -> Option<FrameInput> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MemoryAssetStore;
    use crate::overlay::Phase;
    use crate::pose::{FaceDetection, Rect, Size, ViewGeometry};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn loader() -> AssetLoader {
        let store = MemoryAssetStore::new()
            .with("chain.obj", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n")
            .with("broken.obj", "# nothing here\n");
        let mut meshes = BTreeMap::new();
        meshes.insert("chain".to_string(), PathBuf::from("chain.obj"));
        AssetLoader::current(
            Arc::new(store),
            Arc::new(AssetCatalog::new(meshes, BTreeMap::new())),
        )
    }

    #[tokio::test]
    async fn test_background_load_becomes_ready() {
        let mut loader = loader();
        let mut state = OverlayState::default();

        let ticket = loader
            .request(&mut state, OverlaySelection::Mesh("chain".into()))
            .unwrap();
        let completion = loader.next_completion().await.unwrap();
        assert_eq!(completion.ticket, ticket);

        assert_eq!(
            state.apply_load(completion.ticket, completion.result),
            ApplyOutcome::Applied
        );
        assert!(state.is_ready());
    }

    #[tokio::test]
    async fn test_superseded_load_is_ignored() {
        let mut loader = loader();
        let mut state = OverlayState::default();

        let first = loader
            .request(&mut state, OverlaySelection::Mesh("chain".into()))
            .unwrap();
        let second = loader
            .request(&mut state, OverlaySelection::Mesh("broken.obj".into()))
            .unwrap();

        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let completion = loader.next_completion().await.unwrap();
            let generation = completion.ticket.generation();
            outcomes.push((generation, state.apply_load(completion.ticket, completion.result)));
        }
        outcomes.sort_by_key(|(generation, _)| *generation);

        assert_eq!(outcomes[0], (first.generation(), ApplyOutcome::Stale));
        assert_eq!(outcomes[1], (second.generation(), ApplyOutcome::Failed));
        assert_eq!(state.phase(), Phase::Empty);
    }

    #[tokio::test]
    async fn test_drain_applies_finished_loads() {
        let mut loader = loader();
        let mut state = OverlayState::default();
        let ticket = state.select(OverlaySelection::Mesh("chain".into())).unwrap();
        loader.spawn(ticket).await.unwrap();

        assert_eq!(loader.drain_into(&mut state), 1);
        assert!(state.current_mesh().is_some());
        assert_eq!(loader.drain_into(&mut state), 0);
    }

    #[tokio::test]
    async fn test_drain_skips_failed_and_superseded_loads() {
        let mut loader = loader();
        let mut state = OverlayState::default();

        let old = state.select(OverlaySelection::Mesh("chain".into())).unwrap();
        let failing = state.select(OverlaySelection::Mesh("broken.obj".into())).unwrap();
        loader.spawn(old).await.unwrap();
        loader.spawn(failing).await.unwrap();

        assert_eq!(loader.drain_into(&mut state), 0);
        assert_eq!(state.phase(), Phase::Empty);
    }

    #[test]
    fn test_last_frame_survives_publisher_drop() {
        let (publisher, mut subscriber) = frame_feed();
        let mut state = OverlayState::default();
        let view = ViewGeometry::new(Size::new(100.0, 100.0), Size::new(100.0, 100.0), false);
        let face = FaceDetection::new(Rect::from_origin_size(0.0, 0.0, 120.0, 120.0));

        publisher.publish(FrameInput::new(Some(face), view));
        state.update_frame(subscriber.take_latest().unwrap());
        assert!(state.is_tracking());

        publisher.publish(FrameInput::new(None, view));
        drop(publisher);

        let last = subscriber.take_latest().unwrap();
        assert!(last.detection.is_none());
        state.update_frame(last);
        assert!(!state.is_tracking());
        assert!(subscriber.take_latest().is_none());
    }

    #[tokio::test]
    async fn test_frame_feed_keeps_only_latest() {
        let (publisher, mut subscriber) = frame_feed();
        assert!(subscriber.take_latest().is_none());

        let view = ViewGeometry::new(Size::new(100.0, 100.0), Size::new(100.0, 100.0), false);
        publisher.publish(FrameInput::new(None, view));
        let face = FaceDetection::new(Rect::from_origin_size(0.0, 0.0, 120.0, 120.0));
        publisher.publish(FrameInput::new(Some(face.clone()), view));

        let frame = subscriber.take_latest().unwrap();
        assert_eq!(frame.detection, Some(face));
        assert!(subscriber.take_latest().is_none());

        publisher.publish(FrameInput::new(None, view));
        let next = subscriber.next().await.unwrap();
        assert!(next.detection.is_none());
    }
}
