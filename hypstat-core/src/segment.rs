//! Folds classified lines into runs and blocks.
//!
//! The segmenter is a small state machine driven by [`LineEvent`]s:
//!
//! - `Idle`: no run is open. A run boundary opens one; values open an
//!   implicit run only for grammars that allow it.
//! - `InRun`: values are appended to the current run; a scope opener moves
//!   to `InBlock`.
//! - `InBlock`: block headers and child records build the current block;
//!   a scope closer seals the open block and returns to `InRun`.
//!
//! Runs are numbered 1, 2, ... in file order as they are sealed. Runs that
//! end up with neither samples nor blocks are dropped and do not consume a
//! number. Any log-embedded run number is retained as metadata only.

use crate::grammar::LineEvent;
use crate::sample::{Block, Run, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    InRun,
    InBlock,
}

#[derive(Debug)]
struct OpenRun {
    log_run_number: Option<u32>,
    samples: Vec<Sample>,
    blocks: Vec<Block>,
}

impl OpenRun {
    fn new(log_run_number: Option<u32>) -> Self {
        Self {
            log_run_number,
            samples: Vec::new(),
            blocks: Vec::new(),
        }
    }
}

/// Current run/block cursors for one file.
#[derive(Debug)]
pub struct Segmenter {
    implicit_runs: bool,
    state: State,
    run: Option<OpenRun>,
    block: Option<Block>,
    sealed: Vec<Run>,
}

impl Segmenter {
    pub fn new(implicit_runs: bool) -> Self {
        Self {
            implicit_runs,
            state: State::Idle,
            run: None,
            block: None,
            sealed: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn feed(&mut self, event: LineEvent) {
        match event {
            LineEvent::RunBoundary { log_run_number } => {
                self.seal_run();
                self.run = Some(OpenRun::new(log_run_number));
                self.state = State::InRun;
            }
            LineEvent::Value { channel, value } => {
                if self.run.is_none() && self.implicit_runs {
                    self.run = Some(OpenRun::new(None));
                    self.state = State::InRun;
                }
                if let Some(run) = self.run.as_mut() {
                    let position = run.samples.len() as f64;
                    run.samples.push(Sample::new(channel, position, value));
                }
            }
            LineEvent::ScopeOpen => {
                if self.state != State::Idle {
                    self.seal_block();
                    self.state = State::InBlock;
                }
            }
            LineEvent::BlockOpen(name) => {
                if self.state == State::InBlock {
                    self.seal_block();
                    self.block = Some(Block::new(name));
                }
            }
            LineEvent::Child(child) => {
                if self.state == State::InBlock {
                    if let Some(block) = self.block.as_mut() {
                        block.children.push(child);
                    }
                }
            }
            LineEvent::ScopeClose => {
                if self.state == State::InBlock {
                    self.seal_block();
                    self.state = State::InRun;
                }
            }
            LineEvent::Ignored => {}
        }
    }

    /// Seal whatever is still open and return the runs in file order.
    pub fn finish(mut self) -> Vec<Run> {
        self.seal_run();
        self.sealed
    }

    fn seal_block(&mut self) {
        if let Some(block) = self.block.take() {
            if let Some(run) = self.run.as_mut() {
                run.blocks.push(block);
            }
        }
    }

    fn seal_run(&mut self) {
        self.seal_block();
        if let Some(open) = self.run.take() {
            let run = Run {
                run_id: self.sealed.len() + 1,
                log_run_number: open.log_run_number,
                samples: open.samples,
                blocks: open.blocks,
            };
            if !run.is_empty() {
                self.sealed.push(run);
            }
        }
        self.state = State::Idle;
    }
}
