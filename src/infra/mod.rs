// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several other layers:
//
//   storage.rs    — ObjectStore backends
//                   LocalStore writes under the checkpoint
//                   directory, BucketFsStore talks HTTP to a
//                   remote bucket. Both move raw bytes only.
//
//   checkpoint.rs — Model artifacts and side files
//                   Serialises weights with Burn's bytes
//                   recorder, names them autoencoder_*.pth,
//                   and saves/loads the JSON needed to rebuild
//                   the network for inference.
//
//   metrics.rs    — Training metrics logging
//                   Writes epoch-level losses to a CSV file
//                   for later analysis and plotting.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Records and Checkpointing)

/// Local and BucketFS object stores
pub mod storage;

/// Weight artifacts and JSON side files
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
