//! Stage graph
//!
//! Tasks of a plan with their "run after" dependencies, flattened into
//! ordered stages. A task lands in the first stage that is both at or after
//! its requested minimum stage and strictly after every task it depends on.

use tracing::{debug, instrument};

use crate::domain::errors::{CollectorError, CollectorResult};
use crate::domain::models::{PipelinePlan, PipelineStage, PipelineTask};

#[derive(Debug, Clone)]
struct StageNode {
    task: PipelineTask,
    min_stage: usize,
}

/// Adjacency list of task dependencies.
///
/// Dependencies may only point at tasks added earlier, so the graph cannot
/// contain a cycle; [`StageGraph::validate`] re-checks this before
/// flattening.
#[derive(Debug, Clone, Default)]
pub struct StageGraph {
    nodes: Vec<StageNode>,
    /// node index -> indices of the nodes it runs after
    adjacency_list: Vec<Vec<usize>>,
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add an independent task that must not run before `min_stage`.
    pub fn add_task(&mut self, task: PipelineTask, min_stage: usize) -> usize {
        self.nodes.push(StageNode { task, min_stage });
        self.adjacency_list.push(Vec::new());
        self.nodes.len() - 1
    }

    /// Add a task that runs in a later stage than `after`.
    pub fn add_dependent(&mut self, task: PipelineTask, after: usize) -> CollectorResult<usize> {
        let Some(parent) = self.nodes.get(after) else {
            return Err(CollectorError::Validation(format!(
                "dependency {after} does not exist in the stage graph"
            )));
        };
        let min_stage = parent.min_stage;
        let index = self.add_task(task, min_stage);
        self.adjacency_list[index].push(after);
        Ok(index)
    }

    /// Every dependency points at an earlier node.
    pub fn validate(&self) -> CollectorResult<()> {
        for (index, deps) in self.adjacency_list.iter().enumerate() {
            if let Some(bad) = deps.iter().find(|&&dep| dep >= index) {
                return Err(CollectorError::Validation(format!(
                    "task {index} depends on {bad}, which is not scheduled before it"
                )));
            }
        }
        Ok(())
    }

    /// Stage of every node.
    fn levels(&self) -> Vec<usize> {
        let mut levels: Vec<usize> = Vec::with_capacity(self.nodes.len());
        for (node, deps) in self.nodes.iter().zip(&self.adjacency_list) {
            let after_deps = deps.iter().map(|&dep| levels[dep] + 1).max().unwrap_or(0);
            levels.push(node.min_stage.max(after_deps));
        }
        levels
    }

    /// Flatten into stages; tasks keep insertion order within a stage.
    #[instrument(skip(self), fields(tasks = self.nodes.len()))]
    pub fn into_plan(self) -> CollectorResult<PipelinePlan> {
        self.validate()?;
        let levels = self.levels();
        let stage_count = levels.iter().max().map_or(0, |max| max + 1);

        let mut stages: Vec<PipelineStage> = vec![Vec::new(); stage_count];
        for (node, level) in self.nodes.into_iter().zip(levels) {
            stages[level].push(node.task);
        }
        debug!(stages = stages.len(), "stage graph flattened");
        Ok(PipelinePlan::new(stages))
    }
}
