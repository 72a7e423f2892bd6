//! Pipeline stages for screenshot-to-record extraction.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! scan ──▶ condition ──▶ document ──▶ ocr ──▶ normalize ──▶ mapper
//! (dir)    (in place)    (PNG)        (text)  (tokens)      (record)
//! ```
//!
//! 1. [`scan`]       list the directory, keep `.jpg`/`.jpeg`, derive dates
//! 2. [`condition`]  brightness/contrast transform, written back to disk
//! 3. [`document`]   lossless single-page PNG for the OCR backend
//! 4. [`ocr`]        the [`ocr::TextExtractor`] seam; tesseract by default
//! 5. [`normalize`]  seven ordered rules turning OCR text into tokens
//! 6. [`mapper`]     positional schema turning tokens into a record

pub mod condition;
pub mod document;
pub mod mapper;
pub mod normalize;
pub mod ocr;
pub mod scan;
