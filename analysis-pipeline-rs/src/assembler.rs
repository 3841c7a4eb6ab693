//! Response assembly.
//!
//! Maps the executor's ordered stage results into the envelope shape the task
//! family mandates. The envelope is always fully populated: a sub-question
//! with no usable result assembles as its kind's fallback value, never as a
//! missing position or key.

use serde_json::Map;

use crate::fallback::FallbackProvider;
use crate::types::{RequestContext, ResponseEnvelope, StageResult};

/// Builds the response envelope for a request
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseAssembler {
    fallback: FallbackProvider,
}

impl ResponseAssembler {
    /// Assemble results into the family's envelope shape.
    ///
    /// `results` is positional; any index missing a value is padded with the
    /// family's substitute for the sub-question's kind so the envelope shape
    /// is always complete.
    pub fn assemble(&self, ctx: &RequestContext, results: &[StageResult]) -> ResponseEnvelope {
        let values = ctx.sub_questions.iter().enumerate().map(|(i, sub)| {
            let value = results
                .get(i)
                .and_then(|r| r.value())
                .cloned()
                .unwrap_or_else(|| self.fallback.placeholder_answer(&ctx.family, sub.kind));
            (sub, value)
        });

        if ctx.family.is_array_shaped() {
            ResponseEnvelope::Array(values.map(|(_, v)| v).collect())
        } else {
            let mut map = Map::new();
            for (sub, value) in values {
                map.insert(sub.text.clone(), value);
            }
            ResponseEnvelope::Object(map)
        }
    }

    /// The envelope a request would get if every stage fell back; used as the
    /// last-resort answer when even the executor cannot be awaited
    pub fn full_fallback(&self, ctx: &RequestContext) -> ResponseEnvelope {
        self.assemble(ctx, &[])
    }
}
