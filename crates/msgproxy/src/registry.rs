//! Compile-time stage registry and pipeline builder.
//!
//! Each CLI token `name[:options]` resolves to a factory that receives
//! the stage's pipeline position and its option string. Factories whose
//! meaning depends on position (the transports) build a source at
//! position 0 and a sink otherwise; codec factories refuse position 0.

use bytes::Bytes;

use msgproxy_codec::{
    as_decoder, as_encoder, lines_decoder, lines_encoder, DelimDecoder, DelimEncoder, JsonToXml,
    LengthDecoder, LengthEncoder, LogStage, NewlineEscaper, NewlineUnescaper, NullCodec, SkipCodec,
    StripCodec, UrlDecoder, UrlEncoder, XmlToJson,
};
use msgproxy_core::{Pipeline, Result, Source, Stage, StageError};
use msgproxy_transport::{
    parse_addr, FileSink, FileSource, FolderSink, FolderSource, StdinSource, StdoutSink, TcpSink,
    TcpSource, UdpSink, UdpSource,
};

/// What a factory produced for its position.
pub enum Built {
    Source(Box<dyn Source>),
    Stage(Box<dyn Stage>),
}

type Factory = fn(position: usize, options: Option<&str>) -> Result<Built>;

const REGISTRY: &[(&str, Factory)] = &[
    ("tcp", build_tcp),
    ("udp", build_udp),
    ("-", build_std),
    ("std", build_std),
    ("file", build_file),
    ("folder", build_folder),
    ("zmq", build_zmq),
    ("log", build_log),
    ("null", build_null),
    ("skip", build_skip),
    ("strip", build_strip),
    ("+length", build_length_encode),
    ("-length", build_length_decode),
    ("+delim", build_delim_encode),
    ("-delim", build_delim_decode),
    ("+lines", build_lines_encode),
    ("-lines", build_lines_decode),
    ("+url", build_url_encode),
    ("-url", build_url_decode),
    ("+n", build_newline_escape),
    ("-n", build_newline_unescape),
    ("xml-json", build_xml_to_json),
    ("json-xml", build_json_to_xml),
];

/// Build a runnable pipeline from the ordered CLI stage tokens.
pub fn build_pipeline(tokens: &[String]) -> Result<Pipeline> {
    if tokens.len() < 2 {
        return Err(StageError::invalid_option(
            "a pipeline needs at least a source and a sink",
        ));
    }

    let mut source: Option<Box<dyn Source>> = None;
    let mut stages: Vec<Box<dyn Stage>> = Vec::new();

    for (position, token) in tokens.iter().enumerate() {
        let (name, options) = split_token(token);
        let factory = lookup(name).ok_or_else(|| {
            StageError::invalid_option(format!("unknown stage '{name}'"))
        })?;
        match factory(position, options)? {
            Built::Source(built) => source = Some(built),
            Built::Stage(built) => stages.push(built),
        }
    }

    let source = source.expect("factories build a source at position 0");
    Pipeline::new(source, stages)
}

fn lookup(name: &str) -> Option<Factory> {
    REGISTRY
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, factory)| *factory)
}

fn split_token(token: &str) -> (&str, Option<&str>) {
    match token.split_once(':') {
        Some((name, options)) => (name, Some(options)),
        None => (token, None),
    }
}

fn require_options<'a>(name: &str, options: Option<&'a str>) -> Result<&'a str> {
    options.ok_or_else(|| StageError::invalid_option(format!("stage '{name}' needs options")))
}

fn reject_options(name: &str, options: Option<&str>) -> Result<()> {
    match options {
        Some(options) => Err(StageError::invalid_option(format!(
            "stage '{name}' takes no options (got '{options}')"
        ))),
        None => Ok(()),
    }
}

fn sink_only(position: usize, name: &str) -> Result<()> {
    if position == 0 {
        return Err(StageError::invalid_option(format!(
            "stage '{name}' cannot sit at the source position"
        )));
    }
    Ok(())
}

/// Interpret C-style escapes in an option string, so shell-typed
/// delimiters like `+delim:\n` mean a real newline. On the wire the
/// resulting bytes are used verbatim.
fn unescape_option(name: &str, options: &str) -> Result<Bytes> {
    let mut out = Vec::with_capacity(options.len());
    let mut bytes = options.bytes();
    while let Some(byte) = bytes.next() {
        if byte != b'\\' {
            out.push(byte);
            continue;
        }
        match bytes.next() {
            Some(b'\\') => out.push(b'\\'),
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(b'0') => out.push(0),
            Some(other) => {
                return Err(StageError::invalid_option(format!(
                    "stage '{name}': unknown escape \\{} in '{options}'",
                    char::from(other)
                )))
            }
            None => {
                return Err(StageError::invalid_option(format!(
                    "stage '{name}': dangling escape in '{options}'"
                )))
            }
        }
    }
    Ok(Bytes::from(out))
}

fn build_tcp(position: usize, options: Option<&str>) -> Result<Built> {
    let options = require_options("tcp", options)?;
    if position == 0 {
        let (address, keep_listening) = match options.strip_suffix(",keep") {
            Some(address) => (address, true),
            None => (options, false),
        };
        let addr = parse_addr(address)?;
        Ok(Built::Source(Box::new(TcpSource::bind(addr, keep_listening)?)))
    } else {
        let addr = parse_addr(options)?;
        Ok(Built::Stage(Box::new(TcpSink::connect(addr)?)))
    }
}

fn build_udp(position: usize, options: Option<&str>) -> Result<Built> {
    let addr = parse_addr(require_options("udp", options)?)?;
    if position == 0 {
        Ok(Built::Source(Box::new(UdpSource::bind(addr)?)))
    } else {
        Ok(Built::Stage(Box::new(UdpSink::connect(addr)?)))
    }
}

fn build_std(position: usize, options: Option<&str>) -> Result<Built> {
    reject_options("std", options)?;
    if position == 0 {
        Ok(Built::Source(Box::new(StdinSource::new())))
    } else {
        Ok(Built::Stage(Box::new(StdoutSink::new())))
    }
}

fn build_file(position: usize, options: Option<&str>) -> Result<Built> {
    let path = require_options("file", options)?;
    if position == 0 {
        Ok(Built::Source(Box::new(FileSource::open(path)?)))
    } else {
        Ok(Built::Stage(Box::new(FileSink::open(path)?)))
    }
}

fn build_folder(position: usize, options: Option<&str>) -> Result<Built> {
    let path = require_options("folder", options)?;
    if position == 0 {
        Ok(Built::Source(Box::new(FolderSource::open(path)?)))
    } else {
        Ok(Built::Stage(Box::new(FolderSink::open(path)?)))
    }
}

#[cfg(feature = "zmq")]
fn build_zmq(position: usize, options: Option<&str>) -> Result<Built> {
    use msgproxy_transport::{ZmqMode, ZmqSink, ZmqSource};

    let options = require_options("zmq", options)?;
    let (mode, address) = options.split_once(':').ok_or_else(|| {
        StageError::invalid_option(format!("zmq options '{options}': expected MODE:address"))
    })?;
    let mode: ZmqMode = mode.parse()?;
    if position == 0 {
        Ok(Built::Source(Box::new(ZmqSource::open(mode, address)?)))
    } else {
        Ok(Built::Stage(Box::new(ZmqSink::open(mode, address)?)))
    }
}

#[cfg(not(feature = "zmq"))]
fn build_zmq(_position: usize, _options: Option<&str>) -> Result<Built> {
    Err(StageError::invalid_option(
        "this build has no zmq support (enable the 'zmq' cargo feature)",
    ))
}

fn build_log(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "log")?;
    Ok(Built::Stage(Box::new(LogStage::new(
        options.unwrap_or("log"),
    ))))
}

fn build_null(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "null")?;
    reject_options("null", options)?;
    Ok(Built::Stage(Box::new(as_encoder(NullCodec))))
}

fn build_skip(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "skip")?;
    let options = require_options("skip", options)?;
    let count: i64 = options.parse().map_err(|_| {
        StageError::invalid_option(format!("skip count '{options}' is not an integer"))
    })?;
    Ok(Built::Stage(Box::new(as_encoder(SkipCodec::new(count)))))
}

fn build_strip(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "strip")?;
    reject_options("strip", options)?;
    Ok(Built::Stage(Box::new(as_encoder(StripCodec))))
}

fn build_length_encode(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "+length")?;
    reject_options("+length", options)?;
    Ok(Built::Stage(Box::new(as_encoder(LengthEncoder))))
}

fn build_length_decode(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "-length")?;
    reject_options("-length", options)?;
    Ok(Built::Stage(Box::new(as_decoder(LengthDecoder))))
}

fn build_delim_encode(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "+delim")?;
    let delimiter = unescape_option("+delim", require_options("+delim", options)?)?;
    Ok(Built::Stage(Box::new(as_encoder(DelimEncoder::new(
        delimiter,
    )?))))
}

fn build_delim_decode(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "-delim")?;
    let delimiter = unescape_option("-delim", require_options("-delim", options)?)?;
    Ok(Built::Stage(Box::new(as_decoder(DelimDecoder::new(
        delimiter,
    )?))))
}

fn build_lines_encode(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "+lines")?;
    reject_options("+lines", options)?;
    Ok(Built::Stage(Box::new(as_encoder(lines_encoder()))))
}

fn build_lines_decode(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "-lines")?;
    reject_options("-lines", options)?;
    Ok(Built::Stage(Box::new(as_decoder(lines_decoder()))))
}

fn build_url_encode(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "+url")?;
    reject_options("+url", options)?;
    Ok(Built::Stage(Box::new(as_encoder(UrlEncoder))))
}

fn build_url_decode(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "-url")?;
    reject_options("-url", options)?;
    Ok(Built::Stage(Box::new(as_encoder(UrlDecoder))))
}

fn build_newline_escape(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "+n")?;
    reject_options("+n", options)?;
    Ok(Built::Stage(Box::new(as_encoder(NewlineEscaper))))
}

fn build_newline_unescape(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "-n")?;
    reject_options("-n", options)?;
    Ok(Built::Stage(Box::new(as_encoder(NewlineUnescaper))))
}

fn build_xml_to_json(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "xml-json")?;
    reject_options("xml-json", options)?;
    Ok(Built::Stage(Box::new(as_encoder(XmlToJson))))
}

fn build_json_to_xml(position: usize, options: Option<&str>) -> Result<Built> {
    sink_only(position, "json-xml")?;
    reject_options("json-xml", options)?;
    Ok(Built::Stage(Box::new(as_encoder(JsonToXml))))
}
