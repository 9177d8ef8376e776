//! Sensor inputs.  The only sensor on this board is the S0 pulse input,
//! one instance per meter slot.

pub mod pulse;
