//! Build task graph and level-parallel scheduler.
//!
//! A [`BuildPlan`] is an explicit, acyclic graph of compile, generate, and
//! package tasks. [`BuildPlan::levels`] layers it topologically; tasks in a
//! level share no dependencies and run in parallel on the rayon pool.
//! Execution stops after the first level containing a failure, so no task
//! ever starts after one of its inputs failed.

use crate::interface::HostLanguage;
use bindkit_common::{BuildMatrix, PlannedTarget, WrappedLibrary};
use log::{debug, info};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// One unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Compile one library for one target.
    Compile {
        /// Library to compile.
        library: WrappedLibrary,
        /// Target and compiler front end.
        target: PlannedTarget,
    },
    /// Generate one binding module.
    Generate {
        /// Library whose interface is rendered.
        library: WrappedLibrary,
        /// Host language.
        language: HostLanguage,
    },
    /// Package every binary of one library.
    Package {
        /// Library to package.
        library: WrappedLibrary,
    },
}

impl Task {
    /// Library the task works on.
    #[must_use]
    pub const fn library(&self) -> WrappedLibrary {
        match self {
            Self::Compile { library, .. }
            | Self::Generate { library, .. }
            | Self::Package { library } => *library,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile { library, target } => {
                write!(f, "compile {library} for {} ({})", target.tuple, target.tool.program())
            }
            Self::Generate { library, language } => write!(f, "generate {language} for {library}"),
            Self::Package { library } => write!(f, "package {library}"),
        }
    }
}

/// Index of a task within its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(usize);

/// Errors in graph construction or ordering.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A dependency names a task that is not in the plan.
    #[error("task #{id} is not part of this plan")]
    UnknownTask {
        /// The unknown index.
        id: usize,
    },

    /// The dependencies form a cycle.
    #[error("dependency cycle between: {}", .tasks.join(", "))]
    Cycle {
        /// Tasks left unordered, described.
        tasks: Vec<String>,
    },
}

/// An acyclic graph of build tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    tasks: Vec<Task>,
    deps: Vec<BTreeSet<TaskId>>,
}

impl BuildPlan {
    /// Create an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan the full pipeline for `libraries`: every buildable target is
    /// compiled, then bindings are generated and the library packaged.
    ///
    /// Generate and package tasks depend on every compile task of their
    /// library; packaging also waits for the library's bindings.
    #[must_use]
    pub fn for_matrix(
        libraries: &[WrappedLibrary],
        matrix: &BuildMatrix,
        languages: &[HostLanguage],
    ) -> Self {
        let mut plan = Self::new();
        for &library in libraries {
            let compiles: Vec<TaskId> = matrix
                .buildable
                .iter()
                .map(|&target| plan.add(Task::Compile { library, target }))
                .collect();
            let generates: Vec<TaskId> = languages
                .iter()
                .map(|&language| plan.add(Task::Generate { library, language }))
                .collect();
            let package = plan.add(Task::Package { library });
            for &generate in &generates {
                plan.link(generate, &compiles);
            }
            plan.link(package, &compiles);
            plan.link(package, &generates);
        }
        plan
    }

    /// Add a task with no dependencies.
    pub fn add(&mut self, task: Task) -> TaskId {
        self.tasks.push(task);
        self.deps.push(BTreeSet::new());
        TaskId(self.tasks.len() - 1)
    }

    fn link(&mut self, task: TaskId, on: &[TaskId]) {
        if let Some(deps) = self.deps.get_mut(task.0) {
            deps.extend(on.iter().copied());
        }
    }

    /// Record that `task` cannot start before `on` finished.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownTask`] when either id is foreign.
    pub fn depend(&mut self, task: TaskId, on: TaskId) -> Result<(), GraphError> {
        if on.0 >= self.tasks.len() {
            return Err(GraphError::UnknownTask { id: on.0 });
        }
        let deps = self
            .deps
            .get_mut(task.0)
            .ok_or(GraphError::UnknownTask { id: task.0 })?;
        deps.insert(on);
        Ok(())
    }

    /// The task behind `id`.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.0)
    }

    /// Dependencies of `id`.
    pub fn dependencies(&self, id: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.deps.get(id.0).into_iter().flatten().copied()
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the plan has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Layer the graph: every task appears in a later level than each of
    /// its dependencies. Ids within a level are ascending.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] naming every task that could not be
    /// ordered.
    pub fn levels(&self) -> Result<Vec<Vec<TaskId>>, GraphError> {
        let mut remaining: Vec<usize> = self.deps.iter().map(BTreeSet::len).collect();
        let mut dependents: Vec<Vec<TaskId>> = vec![Vec::new(); self.tasks.len()];
        for (index, deps) in self.deps.iter().enumerate() {
            for dep in deps {
                if let Some(list) = dependents.get_mut(dep.0) {
                    list.push(TaskId(index));
                }
            }
        }

        let mut levels = Vec::new();
        let mut ready: Vec<TaskId> = (0..self.tasks.len())
            .filter(|&index| remaining.get(index) == Some(&0))
            .map(TaskId)
            .collect();
        let mut placed = 0;
        while !ready.is_empty() {
            placed += ready.len();
            let mut next = Vec::new();
            for id in &ready {
                for dependent in dependents.get(id.0).into_iter().flatten() {
                    if let Some(count) = remaining.get_mut(dependent.0) {
                        *count -= 1;
                        if *count == 0 {
                            next.push(*dependent);
                        }
                    }
                }
            }
            next.sort_unstable();
            levels.push(std::mem::replace(&mut ready, next));
        }

        if placed < self.tasks.len() {
            let tasks = remaining
                .iter()
                .zip(&self.tasks)
                .filter(|(count, _)| **count > 0)
                .map(|(_, task)| task.to_string())
                .collect();
            return Err(GraphError::Cycle { tasks });
        }
        Ok(levels)
    }

    /// Run every task, level by level, with tasks of a level in parallel.
    ///
    /// # Errors
    ///
    /// Returns the ordering error, converted, when the plan has a cycle,
    /// otherwise the first error returned by `run`. Later levels are not
    /// started once a level has failed.
    pub fn execute<E, F>(&self, run: F) -> Result<(), E>
    where
        E: From<GraphError> + Send,
        F: Fn(&Task) -> Result<(), E> + Sync,
    {
        let levels = self.levels()?;
        info!("executing {} tasks in {} levels", self.len(), levels.len());
        for (depth, level) in levels.iter().enumerate() {
            debug!("level {depth}: {} tasks", level.len());
            let tasks: Vec<&Task> = level.iter().filter_map(|id| self.task(*id)).collect();
            tasks.par_iter().try_for_each(|task| {
                debug!("starting {task}");
                run(task)
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindkit_common::{BuildTool, CapabilityTable, HostOs, TargetTuple};
    use rstest::{fixture, rstest};
    use std::sync::Mutex;

    #[fixture]
    fn matrix() -> BuildMatrix {
        let declared: Vec<TargetTuple> = ["macos-arm64", "ios-arm64", "ios-simulator-arm64"]
            .iter()
            .map(|label| label.parse().expect("valid tuple"))
            .collect();
        CapabilityTable::default().plan(HostOs::MacOs, &declared)
    }

    fn level_of(levels: &[Vec<TaskId>], id: TaskId) -> usize {
        levels
            .iter()
            .position(|level| level.contains(&id))
            .expect("task is scheduled")
    }

    #[rstest]
    fn generate_runs_after_every_compile_of_its_library(matrix: BuildMatrix) {
        let plan = BuildPlan::for_matrix(
            &[WrappedLibrary::Askar, WrappedLibrary::IndyVdr],
            &matrix,
            &HostLanguage::ALL,
        );
        let levels = plan.levels().expect("acyclic");
        assert_eq!(plan.len(), 2 * (3 + 2 + 1));

        for index in 0..plan.len() {
            let id = TaskId(index);
            let task = plan.task(id).expect("task");
            if let Task::Generate { library, .. } = task {
                for other in 0..plan.len() {
                    let other_id = TaskId(other);
                    if let Some(Task::Compile { library: lib, .. }) = plan.task(other_id) {
                        if lib == library {
                            assert!(level_of(&levels, other_id) < level_of(&levels, id));
                        }
                    }
                }
            }
        }
    }

    #[rstest]
    fn levels_group_independent_tasks(matrix: BuildMatrix) {
        let plan = BuildPlan::for_matrix(&[WrappedLibrary::Anoncreds], &matrix, &[HostLanguage::Swift]);
        let levels = plan.levels().expect("acyclic");
        let shape: Vec<usize> = levels.iter().map(Vec::len).collect();
        assert_eq!(shape, vec![3, 1, 1]);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut plan = BuildPlan::new();
        let package = plan.add(Task::Package {
            library: WrappedLibrary::Askar,
        });
        let generate = plan.add(Task::Generate {
            library: WrappedLibrary::Askar,
            language: HostLanguage::Kotlin,
        });
        plan.depend(package, generate).expect("known ids");
        plan.depend(generate, package).expect("known ids");

        let err = plan.levels().expect_err("cycle");
        assert_eq!(
            err,
            GraphError::Cycle {
                tasks: vec![
                    "package askar".to_owned(),
                    "generate kotlin for askar".to_owned()
                ],
            }
        );
    }

    #[test]
    fn foreign_ids_are_rejected() {
        let mut plan = BuildPlan::new();
        let only = plan.add(Task::Package {
            library: WrappedLibrary::Askar,
        });
        assert_eq!(
            plan.depend(only, TaskId(7)),
            Err(GraphError::UnknownTask { id: 7 })
        );
    }

    #[derive(Debug, PartialEq, Eq)]
    enum RunError {
        Graph(GraphError),
        Failed(String),
    }

    impl From<GraphError> for RunError {
        fn from(err: GraphError) -> Self {
            Self::Graph(err)
        }
    }

    #[rstest]
    fn failing_level_stops_later_levels(matrix: BuildMatrix) {
        let plan = BuildPlan::for_matrix(&[WrappedLibrary::Askar], &matrix, &[HostLanguage::Swift]);
        let started = Mutex::new(Vec::new());
        let result = plan.execute(|task| {
            started.lock().expect("lock").push(*task);
            match task {
                Task::Compile { target, .. } if target.tuple.to_string() == "ios-arm64" => {
                    Err(RunError::Failed(task.to_string()))
                }
                _ => Ok(()),
            }
        });

        assert!(matches!(result, Err(RunError::Failed(_))));
        let started = started.into_inner().expect("lock");
        assert!(
            started
                .iter()
                .all(|task| matches!(task, Task::Compile { .. }))
        );
    }

    #[rstest]
    fn successful_plan_runs_every_task_once(matrix: BuildMatrix) {
        let plan = BuildPlan::for_matrix(
            &[WrappedLibrary::Askar, WrappedLibrary::Anoncreds],
            &matrix,
            &HostLanguage::ALL,
        );
        let started = Mutex::new(Vec::new());
        plan.execute::<RunError, _>(|task| {
            started.lock().expect("lock").push(*task);
            Ok(())
        })
        .expect("all tasks succeed");
        let started = started.into_inner().expect("lock");
        assert_eq!(started.len(), plan.len());
        assert!(started.iter().any(|task| matches!(
            task,
            Task::Compile {
                target: PlannedTarget {
                    tool: BuildTool::Cargo,
                    ..
                },
                ..
            }
        )));
    }
}
