mod blend_tree;
mod motion;
mod motion_layer;
mod motion_stack;
mod motion_transition;
mod skeleton_animation;

pub use blend_tree::*;
pub use motion::*;
pub use motion_layer::*;
pub use motion_stack::*;
pub use motion_transition::*;
pub use skeleton_animation::*;


#[cfg(all(test, feature = "json"))]
mod blend_tree_tests;

#[cfg(all(test, feature = "json"))]
mod motion_tests;


#[cfg(all(test, feature = "json"))]
mod motion_layer_tests;
