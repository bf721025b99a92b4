//! Polars-backed engine.

use std::io::Cursor;

use bytes::Bytes;
use polars::prelude::{self as pl, IntoLazy, SerReader};
use tracing::debug;

use framebridge_types::{BinaryOp, CsvReadConfig, Encoding, Expr, Handle, Literal, PlanOp, Shape};

use crate::engine::{Engine, EngineConfig};
use crate::error::{EngineError, EngineResult};
use crate::table::ObjectTable;

/// Engine that keeps polars `DataFrame`s in an [`ObjectTable`].
#[derive(Default)]
pub struct PolarsEngine {
    frames: ObjectTable<pl::DataFrame>,
    config: Option<EngineConfig>,
}

impl PolarsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn config(&self) -> EngineResult<&EngineConfig> {
        self.config.as_ref().ok_or(EngineError::NotInitialized)
    }
}

impl Engine for PolarsEngine {
    fn name(&self) -> &str {
        "polars"
    }

    fn init(&mut self, config: &EngineConfig) -> EngineResult<()> {
        debug!("[polars] init with num_threads={:?}", config.num_threads);
        self.config = Some(config.clone());
        Ok(())
    }

    fn read_csv(&mut self, buf: Bytes, options: &CsvReadConfig) -> EngineResult<Handle> {
        let n_threads = options.num_threads.or(self.config()?.num_threads);
        let len = buf.len();

        let parse_options = pl::CsvParseOptions::default()
            .with_separator(options.separator)
            .with_encoding(match options.encoding {
                Encoding::Utf8 => pl::CsvEncoding::Utf8,
                Encoding::LossyUtf8 => pl::CsvEncoding::LossyUtf8,
            })
            .with_try_parse_dates(options.parse_dates);

        let df = pl::CsvReadOptions::default()
            .with_infer_schema_length(Some(options.infer_schema_length))
            .with_has_header(options.has_header)
            .with_ignore_errors(options.ignore_errors)
            .with_chunk_size(options.chunk_size)
            .with_skip_rows(options.skip_rows)
            .with_skip_rows_after_header(options.skip_rows_after_header)
            .with_rechunk(options.rechunk)
            .with_low_memory(options.low_memory)
            .with_n_rows(options.num_rows)
            .with_n_threads(n_threads)
            .with_parse_options(parse_options)
            .into_reader_with_file_handle(Cursor::new(buf))
            .finish()?;

        let (height, width) = df.shape();
        let handle = self.frames.insert(df);
        debug!("[polars] read_csv {} bytes -> {} ({}x{})", len, handle, height, width);
        Ok(handle)
    }

    fn collect(&mut self, source: Handle, plan: &[PlanOp]) -> EngineResult<Handle> {
        // Cloning a DataFrame only bumps column refcounts.
        let mut lf = self.frames.get(source)?.clone().lazy();
        for op in plan {
            lf = apply_op(lf, op);
        }
        let df = lf.collect()?;
        let handle = self.frames.insert(df);
        debug!("[polars] collect {} ({} ops) -> {}", source, plan.len(), handle);
        Ok(handle)
    }

    fn shape(&self, frame: Handle) -> EngineResult<Shape> {
        let (height, width) = self.frames.get(frame)?.shape();
        Ok(Shape::new(height, width))
    }

    fn columns(&self, frame: Handle) -> EngineResult<Vec<String>> {
        Ok(self
            .frames
            .get(frame)?
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect())
    }

    fn release(&mut self, handle: Handle) -> bool {
        self.frames.remove(handle).is_some()
    }

    fn live_objects(&self) -> usize {
        self.frames.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plan Translation
// ─────────────────────────────────────────────────────────────────────────────

fn apply_op(lf: pl::LazyFrame, op: &PlanOp) -> pl::LazyFrame {
    match op {
        PlanOp::Select { exprs } => lf.select(exprs.iter().map(to_polars).collect::<Vec<_>>()),
        PlanOp::Filter { predicate } => lf.filter(to_polars(predicate)),
        PlanOp::DropNulls { subset: None } => lf.drop_nulls(None),
        PlanOp::DropNulls {
            subset: Some(columns),
        } => {
            let predicate = columns
                .iter()
                .map(|c| pl::col(c.as_str()).is_not_null())
                .reduce(|acc, e| acc.and(e));
            match predicate {
                Some(predicate) => lf.filter(predicate),
                None => lf,
            }
        }
    }
}

fn to_polars(expr: &Expr) -> pl::Expr {
    match expr {
        Expr::Column { name } => pl::col(name.as_str()),
        Expr::Wildcard => pl::col("*"),
        Expr::Literal { value } => match value {
            Literal::Null => pl::lit(pl::NULL),
            Literal::Bool(b) => pl::lit(*b),
            Literal::Int(i) => pl::lit(*i),
            Literal::Float(x) => pl::lit(*x),
            Literal::String(s) => pl::lit(s.as_str()),
        },
        Expr::Binary { left, op, right } => {
            let l = to_polars(left);
            let r = to_polars(right);
            match op {
                BinaryOp::Eq => l.eq(r),
                BinaryOp::NotEq => l.neq(r),
                BinaryOp::Gt => l.gt(r),
                BinaryOp::GtEq => l.gt_eq(r),
                BinaryOp::Lt => l.lt(r),
                BinaryOp::LtEq => l.lt_eq(r),
                BinaryOp::And => l.and(r),
                BinaryOp::Or => l.or(r),
                BinaryOp::Plus => l + r,
                BinaryOp::Minus => l - r,
                BinaryOp::Multiply => l * r,
                BinaryOp::Divide => l / r,
            }
        }
        Expr::Not { input } => to_polars(input).not(),
        Expr::IsNull { input } => to_polars(input).is_null(),
        Expr::IsNotNull { input } => to_polars(input).is_not_null(),
        Expr::Alias { input, name } => to_polars(input).alias(name.as_str()),
    }
}
