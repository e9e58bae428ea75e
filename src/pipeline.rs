// Copyright (C) 2023 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serializes long-running mesh operations on a background worker so the
//! calling thread never blocks. Tasks run strictly in FIFO order, one at a
//! time, each against a private deep copy of the live mesh taken when the
//! task is dispatched. The live mesh is only touched at hand-off time, inside
//! [`MeshPipeline::update`], which the caller drives explicitly: there is no
//! hidden thread draining the queue.
//!
//! A task that fails is a silent no-op (the previous content is kept and the
//! next task still runs), and a worker killed mid-task is treated as a
//! cancellation: the pipeline returns to idle with the mesh unchanged.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

use dyn_clone::DynClone;

use crate::prelude::*;

/// Produces a complete mesh content from its own configuration.
pub trait MeshGenerator: DynClone + Send {
    fn produce(&self) -> Result<HalfEdgeMesh>;
}
dyn_clone::clone_trait_object!(MeshGenerator);

/// Consumes a mesh content and returns the transformed content. Returning an
/// error makes the pipeline keep the previous content unchanged, so a failing
/// modifier can never corrupt the live mesh.
pub trait MeshModifier: DynClone + Send {
    fn apply_self(&self, mesh: HalfEdgeMesh) -> Result<HalfEdgeMesh>;
}
dyn_clone::clone_trait_object!(MeshModifier);

/// Refines a mesh content into a denser one. Same failure convention as
/// [`MeshModifier`].
pub trait MeshSubdividor: DynClone + Send {
    fn apply_self(&self, mesh: HalfEdgeMesh) -> Result<HalfEdgeMesh>;
}
dyn_clone::clone_trait_object!(MeshSubdividor);

/// Reduces a mesh content to a coarser one. Same failure convention as
/// [`MeshModifier`].
pub trait MeshSimplifier: DynClone + Send {
    fn apply_self(&self, mesh: HalfEdgeMesh) -> Result<HalfEdgeMesh>;
}
dyn_clone::clone_trait_object!(MeshSimplifier);

enum MeshTask {
    Create(Box<dyn MeshGenerator>),
    Modify(Box<dyn MeshModifier>),
    Subdivide(Box<dyn MeshSubdividor>),
    Simplify(Box<dyn MeshSimplifier>),
}

impl MeshTask {
    /// Create tasks build their result from scratch; the rest transform a
    /// copy of the live mesh.
    fn needs_input(&self) -> bool {
        !matches!(self, MeshTask::Create(_))
    }
}

enum TaskOutcome {
    Replace(HalfEdgeMesh),
    Unchanged,
}

struct Job {
    task: MeshTask,
    input: Option<HalfEdgeMesh>,
}

fn run_task(task: MeshTask, input: Option<HalfEdgeMesh>) -> TaskOutcome {
    let result = match (task, input) {
        (MeshTask::Create(gen), _) => gen.produce(),
        (MeshTask::Modify(op), Some(mesh)) => op.apply_self(mesh),
        (MeshTask::Subdivide(op), Some(mesh)) => op.apply_self(mesh),
        (MeshTask::Simplify(op), Some(mesh)) => op.apply_self(mesh),
        (_, None) => Err(anyhow!("Task was dispatched without its input copy")),
    };
    match result {
        Ok(mesh) => TaskOutcome::Replace(mesh),
        Err(err) => {
            log::warn!("Mesh task failed, keeping the previous content: {err:#}");
            TaskOutcome::Unchanged
        }
    }
}

struct Worker {
    job_tx: Sender<Job>,
    result_rx: Receiver<TaskOutcome>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn() -> Self {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (result_tx, result_rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            while let Ok(job) = job_rx.recv() {
                let outcome = run_task(job.task, job.input);
                if result_tx.send(outcome).is_err() {
                    break;
                }
            }
        });
        log::debug!("Spawned mesh worker thread");
        Self {
            job_tx,
            result_rx,
            handle,
        }
    }

    /// Graceful shutdown for an idle worker: closing the job channel makes
    /// the thread return from `recv` and exit.
    fn shutdown(self) {
        drop(self.job_tx);
        drop(self.result_rx);
        if self.handle.join().is_err() {
            log::warn!("Mesh worker thread terminated abnormally");
        } else {
            log::debug!("Mesh worker thread shut down");
        }
    }
}

/// Owns a live mesh plus a FIFO queue of construction, modification,
/// subdivision and simplification tasks executed one at a time on a lazily
/// spawned worker thread.
///
/// Callers either edit the mesh synchronously (through [`Self::mesh_mut`] or
/// the sync entry points) while the pipeline [`Self::is_finished`], or drive
/// everything through queued tasks and [`Self::update`]. Interleaving both on
/// the same span of operations is a contract violation and is not detected.
pub struct MeshPipeline {
    mesh: HalfEdgeMesh,
    tasks: VecDeque<MeshTask>,
    worker: Option<Worker>,
    running: bool,
}

impl MeshPipeline {
    pub fn new(mesh: HalfEdgeMesh) -> Self {
        Self {
            mesh,
            tasks: VecDeque::new(),
            worker: None,
            running: false,
        }
    }

    /// Builds the pipeline's initial mesh synchronously from a generator.
    pub fn from_generator(generator: &dyn MeshGenerator) -> Result<Self> {
        Ok(Self::new(generator.produce()?))
    }

    pub fn mesh(&self) -> &HalfEdgeMesh {
        &self.mesh
    }

    /// Synchronous access to the live mesh. Only valid while the pipeline is
    /// finished; mutating the mesh while tasks are queued or running is a
    /// caller-side contract violation.
    pub fn mesh_mut(&mut self) -> &mut HalfEdgeMesh {
        &mut self.mesh
    }

    /// Hands the live mesh back. Any still-running worker winds down on its
    /// own once its channels disconnect; its result is discarded.
    pub fn into_mesh(self) -> HalfEdgeMesh {
        self.mesh
    }

    /// True when no task is queued and none is running. Enqueuing returns
    /// false until the queue drains through [`Self::update`] calls.
    pub fn is_finished(&self) -> bool {
        !self.running && self.tasks.is_empty()
    }

    pub fn queue_create(&mut self, generator: Box<dyn MeshGenerator>) {
        self.tasks.push_back(MeshTask::Create(generator));
    }

    pub fn queue_modify(&mut self, modifier: Box<dyn MeshModifier>) {
        self.tasks.push_back(MeshTask::Modify(modifier));
    }

    pub fn queue_subdivide(&mut self, subdividor: Box<dyn MeshSubdividor>) {
        self.tasks.push_back(MeshTask::Subdivide(subdividor));
    }

    pub fn queue_subdivide_rep(&mut self, subdividor: &(dyn MeshSubdividor + 'static), rep: usize) {
        for _ in 0..rep {
            self.tasks
                .push_back(MeshTask::Subdivide(dyn_clone::clone_box(subdividor)));
        }
    }

    pub fn queue_simplify(&mut self, simplifier: Box<dyn MeshSimplifier>) {
        self.tasks.push_back(MeshTask::Simplify(simplifier));
    }

    /// Applies the modifier on the calling thread when the pipeline is
    /// finished; enqueues it otherwise. Synchronous failures propagate to the
    /// caller and leave the mesh untouched.
    pub fn modify(&mut self, modifier: &(dyn MeshModifier + 'static)) -> Result<()> {
        if self.is_finished() {
            let next = modifier.apply_self(self.mesh.clone())?;
            self.mesh.replace_content(next);
        } else {
            self.queue_modify(dyn_clone::clone_box(modifier));
        }
        Ok(())
    }

    /// Like [`Self::modify`], for subdividors.
    pub fn subdivide(&mut self, subdividor: &(dyn MeshSubdividor + 'static)) -> Result<()> {
        self.subdivide_rep(subdividor, 1)
    }

    /// Applies (or enqueues) `rep` rounds of the subdividor.
    pub fn subdivide_rep(&mut self, subdividor: &(dyn MeshSubdividor + 'static), rep: usize) -> Result<()> {
        if self.is_finished() {
            for _ in 0..rep {
                let next = subdividor.apply_self(self.mesh.clone())?;
                self.mesh.replace_content(next);
            }
        } else {
            self.queue_subdivide_rep(subdividor, rep);
        }
        Ok(())
    }

    /// Like [`Self::modify`], for simplifiers.
    pub fn simplify(&mut self, simplifier: &(dyn MeshSimplifier + 'static)) -> Result<()> {
        if self.is_finished() {
            let next = simplifier.apply_self(self.mesh.clone())?;
            self.mesh.replace_content(next);
        } else {
            self.queue_simplify(dyn_clone::clone_box(simplifier));
        }
        Ok(())
    }

    /// Advances the pipeline state machine without ever blocking: dispatches
    /// the next task when idle, polls the running one for completion, applies
    /// a finished task's content atomically, and shuts the worker down when
    /// the queue has drained.
    pub fn update(&mut self) {
        if !self.running {
            if let Some(task) = self.tasks.pop_front() {
                // The input copy is taken now, not at enqueue time, so every
                // queued task observes the results of the tasks before it.
                let input = task.needs_input().then(|| self.mesh.clone());
                let worker = self.worker.get_or_insert_with(Worker::spawn);
                match worker.job_tx.send(Job { task, input }) {
                    Ok(()) => self.running = true,
                    Err(mpsc::SendError(job)) => {
                        // The worker died between tasks. Put the task back
                        // and retry on a fresh worker at the next update.
                        self.tasks.push_front(job.task);
                        self.worker = None;
                    }
                }
            } else if let Some(worker) = self.worker.take() {
                worker.shutdown();
            }
        } else if let Some(worker) = self.worker.as_ref() {
            match worker.result_rx.try_recv() {
                Ok(TaskOutcome::Replace(content)) => {
                    self.mesh.replace_content(content);
                    self.running = false;
                }
                Ok(TaskOutcome::Unchanged) => {
                    self.running = false;
                }
                Err(TryRecvError::Empty) => {
                    // Still running. Check again at the next update.
                }
                Err(TryRecvError::Disconnected) => {
                    // The execution substrate cancelled the task. Resume idle
                    // with the live mesh unchanged.
                    self.running = false;
                    self.worker = None;
                }
            }
        } else {
            self.running = false;
        }
    }
}
