//! Table modules - each contains an `impl Database` block for one table.

mod items;
