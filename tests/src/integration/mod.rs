//! Cross-crate flows: gateway → engine → mock peers.

mod publishing;
mod subscription;
