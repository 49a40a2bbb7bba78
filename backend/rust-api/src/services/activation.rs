//! Sequential unlock of modules along a learning path.
//!
//! Mandatory module N is active only while every mandatory module before it
//! is completed; optional modules are always active and never gate the chain.

use crate::models::{
    learning_path::{ActivationState, PathCourse, PathModule, PathSubject},
    progress::ModuleRequirement,
};

pub trait Ordered {
    fn order_value(&self) -> Option<f64>;
}

impl Ordered for PathCourse {
    fn order_value(&self) -> Option<f64> {
        self.order_index
    }
}

impl Ordered for PathSubject {
    fn order_value(&self) -> Option<f64> {
        self.order_index
    }
}

impl Ordered for PathModule {
    fn order_value(&self) -> Option<f64> {
        self.order_index
    }
}

/// Sorts by the explicit order value; items without one take their input
/// position as order value, and input position breaks ties.
pub fn sort_by_order<T: Ordered>(items: Vec<T>) -> Vec<T> {
    let mut keyed: Vec<(f64, usize, T)> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| (item.order_value().unwrap_or(index as f64), index, item))
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, _, item)| item).collect()
}

/// Completion for activation purposes, derived per module.
pub fn is_module_completed(module: &PathModule) -> bool {
    module.completed
        || module
            .activity
            .map(|activity| activity.is_complete())
            .unwrap_or(false)
        || module.correctness_percentage >= 100.0
}

/// Orders `modules` and annotates each with its activation state.
pub fn apply_activation(modules: Vec<PathModule>) -> Vec<PathModule> {
    let mut prior_mandatory_completed = true;

    sort_by_order(modules)
        .into_iter()
        .map(|mut module| {
            let requirement = module.status;
            let completed = is_module_completed(&module);
            let is_active = match requirement {
                ModuleRequirement::Optional => true,
                ModuleRequirement::Mandatory => prior_mandatory_completed,
            };
            if requirement.is_mandatory() {
                prior_mandatory_completed = prior_mandatory_completed && completed;
            }

            module.is_mandatory = requirement.is_mandatory();
            module.completed = completed;
            module.is_active = is_active;
            module.active = ActivationState::from(is_active);
            module
        })
        .collect()
}

/// Marks `module` active without touching its completion.
pub fn activate(module: &mut PathModule) {
    module.is_active = true;
    module.active = ActivationState::Active;
}

/// Forces the lowest-ordered module of a subject to be active, so a learner
/// always has somewhere to start.
pub fn ensure_first_module_active(modules: &mut [PathModule]) {
    let first = modules
        .iter()
        .enumerate()
        .map(|(index, module)| (module.order_value().unwrap_or(index as f64), index))
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, index)| index);

    if let Some(module) = first.and_then(|index| modules.get_mut(index)) {
        activate(module);
    }
}
