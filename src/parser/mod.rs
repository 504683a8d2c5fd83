pub mod normalize;
pub mod pdf_reader;
pub mod sentences;

pub use pdf_reader::PdfReader;
pub use sentences::{LooseSplitter, SentenceSplitter, UnicodeSplitter};

/// Splitter selected on the command line.
pub fn splitter(loose: bool) -> Box<dyn SentenceSplitter> {
    if loose {
        Box::new(LooseSplitter)
    } else {
        Box::new(UnicodeSplitter)
    }
}
