mod heap_page;
mod index_roots_page;

pub use heap_page::{
    HeapPage, HeapPageRef, SlotContent, HEAP_PAGE_HEADER_SIZE, MAX_TUPLE_SIZE, SLOT_SIZE,
};
pub use index_roots_page::{IndexRootsPage, IndexRootsPageRef, MAX_INDEX_ROOTS};
