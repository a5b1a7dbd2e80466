mod conversion;
mod pipeline;
mod properties;
