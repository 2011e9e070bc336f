//! Chunk membership as decided by upstream chunk splitting

use crate::types::{ChunkId, FxIndexMap, FxIndexSet, ModuleId};

#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: ChunkId,
    pub name: Option<String>,
    /// Whether the chunk carries its own runtime support code
    pub has_runtime: bool,
    pub entry_modules: FxIndexSet<ModuleId>,
    pub modules: FxIndexSet<ModuleId>,
}

impl Chunk {
    pub fn new(id: ChunkId) -> Self {
        Self {
            id,
            name: None,
            has_runtime: false,
            entry_modules: FxIndexSet::default(),
            modules: FxIndexSet::default(),
        }
    }

    /// Add an entry module; entry modules are also members
    pub fn add_entry_module(&mut self, module: ModuleId) {
        self.entry_modules.insert(module);
        self.modules.insert(module);
    }
}

#[derive(Debug, Default)]
pub struct ChunkGraph {
    chunks: FxIndexMap<ChunkId, Chunk>,
}

impl ChunkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chunk(&mut self, chunk: Chunk) {
        self.chunks.insert(chunk.id, chunk);
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(&id)
    }

    /// Chunks that contain `module`
    pub fn module_chunks(&self, module: ModuleId) -> impl Iterator<Item = &Chunk> {
        self.chunks
            .values()
            .filter(move |chunk| chunk.modules.contains(&module))
    }

    pub fn number_of_entry_modules(&self, id: ChunkId) -> usize {
        self.chunks
            .get(&id)
            .map_or(0, |chunk| chunk.entry_modules.len())
    }
}
