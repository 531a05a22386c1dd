//! # ImageShrink Pipeline Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `options`: Configurazione e validazione parametri del batch
//! - `error`: Tipi di errore custom per le diverse operazioni
//! - `job`: Value object (ShrinkJob, JobResult, BatchReport)
//! - `codec`: Contratto codec, registry e strategie JPEG/PNG delegate
//!   a tool esterni
//! - `runner`: Esecuzione concorrente limitata con risultati incrementali
//! - `pipeline`: Facade pubblica (validazione, dispatch, report)
//! - `tools`: Gestione cross-platform dei tool esterni
//! - `progress`: Progress tracking per la CLI
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use imageshrink::{Pipeline, PipelineOptions};
//!
//! let pipeline = Pipeline::new(PipelineOptions::new(80, "/out"))?;
//! let report = pipeline.run(&paths).await?;
//! println!("{}", report.format_summary());
//! ```

pub mod codec;
pub mod error;
pub mod job;
pub mod options;
pub mod pipeline;
pub mod progress;
pub mod runner;
pub mod tools;
pub mod utils;

pub use codec::{Codec, CodecRegistry, JpegCodec, PngCodec};
pub use error::{FailureKind, ShrinkError};
pub use job::{BatchReport, JobResult, ShrinkJob};
pub use options::PipelineOptions;
pub use pipeline::Pipeline;
pub use runner::{JobCompletion, JobRunner};
