use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::JoinHandle;

use tilespace_common::{NodeId, TileContent};
use tilespace_geo::{CartesianProjection, QuadKey};

use crate::{ElevationKind, TileBuildError};

/// Everything the tile-data pipeline needs to build one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    pub address: QuadKey,
    pub style: String,
    /// Projection current when the load was issued.
    pub projection: CartesianProjection,
    pub elevation: ElevationKind,
    /// Container the results belong in.
    pub container: NodeId,
}

/// A completion delivered back to the owner of world state.
#[derive(Debug, Clone, PartialEq)]
pub enum TileEvent {
    Built {
        address: QuadKey,
        container: NodeId,
        content: TileContent,
    },
    Failed {
        address: QuadKey,
        container: NodeId,
        error: TileBuildError,
    },
    /// The pipeline has shut down; no further events will arrive.
    Closed,
}

/// Turns a request into renderable content. Runs on worker threads.
pub trait TileBuilder: Send + Sync + 'static {
    fn build(&self, request: &TileRequest) -> Result<Vec<TileContent>, TileBuildError>;
}

impl<F> TileBuilder for F
where
    F: Fn(&TileRequest) -> Result<Vec<TileContent>, TileBuildError> + Send + Sync + 'static,
{
    fn build(&self, request: &TileRequest) -> Result<Vec<TileContent>, TileBuildError> {
        self(request)
    }
}

/// Submission and completion queue between the driver and tile production.
///
/// `submit` never blocks on the build. `drain` returns whatever has
/// completed since the last call and is called once per tick.
pub trait TilePipeline {
    fn submit(&mut self, request: TileRequest);
    fn drain(&mut self) -> Vec<TileEvent>;
}

fn events_for(
    request: &TileRequest,
    result: Result<Vec<TileContent>, TileBuildError>,
) -> Vec<TileEvent> {
    match result {
        Ok(contents) => contents
            .into_iter()
            .map(|content| TileEvent::Built {
                address: request.address,
                container: request.container,
                content,
            })
            .collect(),
        Err(error) => vec![TileEvent::Failed {
            address: request.address,
            container: request.container,
            error,
        }],
    }
}

/// Builds on the calling thread during `submit`; results wait for `drain`.
pub struct InlinePipeline<B> {
    builder: B,
    completed: VecDeque<TileEvent>,
}

impl<B: TileBuilder> InlinePipeline<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            completed: VecDeque::new(),
        }
    }
}

impl<B: TileBuilder> TilePipeline for InlinePipeline<B> {
    fn submit(&mut self, request: TileRequest) {
        let result = self.builder.build(&request);
        self.completed.extend(events_for(&request, result));
    }

    fn drain(&mut self) -> Vec<TileEvent> {
        self.completed.drain(..).collect()
    }
}

/// A fixed pool of worker threads fed from a shared job queue.
///
/// Completions come back over a channel and are only touched by whoever
/// calls `drain`, so world state keeps a single writer. Dropping the pool
/// closes the job queue and joins the workers.
pub struct WorkerPipeline {
    jobs: Option<mpsc::Sender<TileRequest>>,
    events: mpsc::Receiver<TileEvent>,
    workers: Vec<JoinHandle<()>>,
    in_flight: Arc<AtomicUsize>,
}

impl WorkerPipeline {
    pub fn spawn<B: TileBuilder>(builder: B, worker_count: usize) -> std::io::Result<Self> {
        let worker_count = worker_count.max(1);
        let (job_tx, job_rx) = mpsc::channel::<TileRequest>();
        let (event_tx, event_rx) = mpsc::channel();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let builder = Arc::new(builder);
        let live = Arc::new(AtomicUsize::new(worker_count));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let job_rx = Arc::clone(&job_rx);
            let event_tx = event_tx.clone();
            let builder = Arc::clone(&builder);
            let live = Arc::clone(&live);
            let in_flight = Arc::clone(&in_flight);
            let handle = std::thread::Builder::new()
                .name(format!("tile-worker-{index}"))
                .spawn(move || {
                    worker_loop(index, &job_rx, &event_tx, builder.as_ref(), &in_flight);
                    if live.fetch_sub(1, Ordering::AcqRel) == 1 {
                        let _ = event_tx.send(TileEvent::Closed);
                    }
                })?;
            workers.push(handle);
        }
        tracing::debug!(workers = worker_count, "tile worker pool started");

        Ok(Self {
            jobs: Some(job_tx),
            events: event_rx,
            workers,
            in_flight,
        })
    }

    /// Requests submitted but not yet finished building.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Close the job queue and wait for the workers to finish what they hold.
    /// Undrained completions, including `Closed`, stay readable.
    pub fn shutdown(&mut self) {
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("tile worker panicked");
            }
        }
    }
}

/// Counts one request as finished when dropped, including on unwind.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn worker_loop<B: TileBuilder>(
    index: usize,
    jobs: &Mutex<mpsc::Receiver<TileRequest>>,
    events: &mpsc::Sender<TileEvent>,
    builder: &B,
    in_flight: &AtomicUsize,
) {
    loop {
        let job = {
            let Ok(rx) = jobs.lock() else {
                tracing::error!(worker = index, "job queue lock poisoned");
                return;
            };
            rx.recv()
        };
        let Ok(request) = job else {
            return;
        };
        let _done = InFlightGuard(in_flight);

        let _span = tracing::debug_span!("build_tile", worker = index, address = %request.address)
            .entered();
        let result = panic::catch_unwind(AssertUnwindSafe(|| builder.build(&request)))
            .unwrap_or_else(|_| {
                tracing::error!(
                    worker = index,
                    address = %request.address,
                    "tile builder panicked"
                );
                Err(TileBuildError::Other(format!("builder panicked on {}", request.address)))
            });
        for event in events_for(&request, result) {
            // Receiver gone means the owner shut down; nothing left to deliver to.
            if events.send(event).is_err() {
                return;
            }
        }
    }
}

impl TilePipeline for WorkerPipeline {
    fn submit(&mut self, request: TileRequest) {
        let Some(jobs) = &self.jobs else {
            tracing::warn!(
                address = %request.address,
                "tile pipeline is shut down; request dropped"
            );
            return;
        };
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        if let Err(mpsc::SendError(request)) = jobs.send(request) {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!(address = %request.address, "no tile workers left; request dropped");
        }
    }

    fn drain(&mut self) -> Vec<TileEvent> {
        self.events.try_iter().collect()
    }
}

impl Drop for WorkerPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tilespace_common::Mesh;
    use tilespace_geo::GeoCoordinate;

    fn request(x: i32) -> TileRequest {
        TileRequest {
            address: QuadKey::new(x, 7, 16),
            style: "default".into(),
            projection: CartesianProjection::new(GeoCoordinate::new(0.0, 0.0)),
            elevation: ElevationKind::Flat,
            container: NodeId::new(),
        }
    }

    fn mesh_builder(request: &TileRequest) -> Result<Vec<TileContent>, TileBuildError> {
        if request.address.tile_x < 0 {
            return Err(TileBuildError::NoData(request.address.to_string()));
        }
        Ok(vec![TileContent::Mesh(Mesh {
            name: request.address.to_string(),
            vertex_count: 4,
            index_count: 6,
        })])
    }

    fn drain_until(pipeline: &mut WorkerPipeline, count: usize) -> Vec<TileEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.len() < count && Instant::now() < deadline {
            events.extend(pipeline.drain());
            std::thread::sleep(Duration::from_millis(1));
        }
        events
    }

    fn settle(pipeline: &WorkerPipeline) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.in_flight() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn inline_pipeline_defers_results_to_drain() {
        let mut pipeline = InlinePipeline::new(mesh_builder);
        let req = request(3);
        pipeline.submit(req.clone());
        pipeline.submit(request(-1));

        let events = pipeline.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            TileEvent::Built { address, container, .. }
                if *address == req.address && *container == req.container
        ));
        assert!(matches!(&events[1], TileEvent::Failed { error: TileBuildError::NoData(_), .. }));
        assert!(pipeline.drain().is_empty());
    }

    #[test]
    fn builder_may_yield_several_contents() {
        let several = |_: &TileRequest| -> Result<Vec<TileContent>, TileBuildError> {
            Ok(vec![
                TileContent::Element(tilespace_common::Element {
                    id: 1,
                    kind: "building".into(),
                }),
                TileContent::Element(tilespace_common::Element {
                    id: 2,
                    kind: "road".into(),
                }),
            ])
        };
        let mut pipeline = InlinePipeline::new(several);
        pipeline.submit(request(0));
        assert_eq!(pipeline.drain().len(), 2);
    }

    #[test]
    fn worker_pipeline_builds_everything_submitted() {
        let mut pipeline = WorkerPipeline::spawn(mesh_builder, 3).unwrap();
        assert_eq!(pipeline.worker_count(), 3);
        for x in 0..9 {
            pipeline.submit(request(x));
        }
        let events = drain_until(&mut pipeline, 9);
        assert_eq!(events.len(), 9);
        assert!(events.iter().all(|e| matches!(e, TileEvent::Built { .. })));
        settle(&pipeline);
        assert_eq!(pipeline.in_flight(), 0);
    }

    #[test]
    fn worker_pipeline_reports_failures() {
        let mut pipeline = WorkerPipeline::spawn(mesh_builder, 1).unwrap();
        pipeline.submit(request(-5));
        let events = drain_until(&mut pipeline, 1);
        assert!(matches!(
            events.as_slice(),
            [TileEvent::Failed { error: TileBuildError::NoData(_), .. }]
        ));
    }

    #[test]
    fn panicking_builder_becomes_a_failure() {
        let fragile = |request: &TileRequest| -> Result<Vec<TileContent>, TileBuildError> {
            if request.address.tile_x == 3 {
                panic!("corrupt source data");
            }
            mesh_builder(request)
        };
        let mut pipeline = WorkerPipeline::spawn(fragile, 1).unwrap();
        for x in 2..5 {
            pipeline.submit(request(x));
        }

        let events = drain_until(&mut pipeline, 3);
        assert_eq!(events.len(), 3);
        let failed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TileEvent::Failed { address, error, .. } => Some((*address, error.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0.tile_x, 3);
        assert!(matches!(failed[0].1, TileBuildError::Other(_)));

        settle(&pipeline);
        assert_eq!(pipeline.in_flight(), 0);
        pipeline.shutdown();
        assert!(matches!(pipeline.drain().last(), Some(TileEvent::Closed)));
    }

    #[test]
    fn shutdown_emits_closed_once() {
        let mut pipeline = WorkerPipeline::spawn(mesh_builder, 2).unwrap();
        pipeline.submit(request(1));
        pipeline.shutdown();

        let events = pipeline.drain();
        let closed = events.iter().filter(|e| matches!(e, TileEvent::Closed)).count();
        assert_eq!(closed, 1);
        assert!(matches!(events.last(), Some(TileEvent::Closed)));

        // Submitting after shutdown is dropped quietly.
        pipeline.submit(request(2));
        assert!(pipeline.drain().is_empty());
    }
}
