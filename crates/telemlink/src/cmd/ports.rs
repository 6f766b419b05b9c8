use telemlink_transport::list_ports;

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let mut ports = list_ports().map_err(|err| transport_error("port scan failed", err))?;
    if let Some(filter) = &args.filter {
        ports.retain(|port| port.matches(filter));
    }
    print_ports(&ports, format);
    Ok(SUCCESS)
}
