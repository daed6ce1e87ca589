pub mod bubbles;
pub mod tank;
