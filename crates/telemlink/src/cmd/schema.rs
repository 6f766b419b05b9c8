use tracing::debug;

use crate::cmd::SchemaArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_schema, OutputFormat};

pub fn run(args: SchemaArgs, format: OutputFormat) -> CliResult<i32> {
    let schema = args.source.load()?;
    debug!(
        path = %args.source.path().display(),
        channels = schema.channels().len(),
        "schema loaded"
    );
    print_schema(&schema, args.source.path(), format);
    Ok(SUCCESS)
}
