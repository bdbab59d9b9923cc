//! Redb table definitions for persistent metadata storage.

use redb::TableDefinition;

// Key: "<table_with_type>/<segment>", Value: bincode-encoded StoredSegment
pub const SEGMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("segments");
