pub mod descriptor;
pub mod instruments;
