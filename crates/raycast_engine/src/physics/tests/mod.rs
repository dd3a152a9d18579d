//! End-to-end ray-cast scenarios
