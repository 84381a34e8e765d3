// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod aggregate;
pub mod clock;
pub mod duplicates;
pub mod edits;
pub mod fields;
pub mod filter;
pub mod ids;
pub mod model;
pub mod navigator;
pub mod pagination;
pub mod records;
pub mod scheduler;
pub mod taxonomy;
pub mod view;

pub use aggregate::*;
pub use clock::*;
pub use duplicates::*;
pub use edits::*;
pub use fields::*;
pub use filter::*;
pub use ids::*;
pub use model::*;
pub use navigator::*;
pub use pagination::*;
pub use records::*;
pub use scheduler::*;
pub use taxonomy::*;
pub use view::*;
