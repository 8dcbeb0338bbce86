use std::io::Read;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::converter::{primary_line, to_feature_collection};
use crate::error::{ParseError, RouteError};
use crate::gpx_types::*;
use crate::options::AnalysisOptions;
use crate::track::{BoundingBox, Track};

type Result<T> = std::result::Result<T, ParseError>;

/// The primary line of a GPX document, ready for analysis.
#[derive(Debug, Clone)]
pub struct ParsedTrack {
    pub name: Option<String>,
    pub track: Track,
    pub bounds: BoundingBox,
}

/// Decode a GPX document and extract its primary track or route.
pub fn parse_track(
    xml: &str,
    opts: &AnalysisOptions,
) -> std::result::Result<ParsedTrack, RouteError> {
    let data = parse_gpx(xml)?;
    let fc = to_feature_collection(&data, opts.join_track_segments);
    let line = primary_line(&fc, data.has_lines())?;
    let track = Track::new(line.points)?;
    let bounds = track.bounds();

    log::debug!(
        "parsed track {:?}: {} points from {} tracks, {} routes",
        line.name,
        track.len(),
        data.tracks.len(),
        data.routes.len()
    );

    Ok(ParsedTrack {
        name: line.name,
        track,
        bounds,
    })
}

/// Same as [`parse_track`] for a raw byte buffer.
pub fn parse_track_bytes(
    bytes: &[u8],
    opts: &AnalysisOptions,
) -> std::result::Result<ParsedTrack, RouteError> {
    let xml = std::str::from_utf8(bytes).map_err(ParseError::from)?;
    parse_track(xml, opts)
}

/// Same as [`parse_track`] for any readable source (file, socket, cursor).
pub fn parse_track_reader<R: Read>(
    mut source: R,
    opts: &AnalysisOptions,
) -> std::result::Result<ParsedTrack, RouteError> {
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes).map_err(ParseError::from)?;
    parse_track_bytes(&bytes, opts)
}

impl GpxData {
    /// Whether the document declared any track or route, even an empty one.
    pub fn has_lines(&self) -> bool {
        !self.tracks.is_empty() || !self.routes.is_empty()
    }
}

/// Parse a GPX XML string into GpxData.
///
/// The document must have a `<gpx>` root that is properly closed; anything
/// else is reported as [`ParseError::InvalidFormat`].
pub fn parse_gpx(xml: &str) -> Result<GpxData> {
    let mut reader = Reader::from_str(xml);
    let mut data = GpxData::default();
    let mut root_open = false;
    let mut root_closed = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"gpx" if !root_open => root_open = true,
                _ if !root_open => return Err(ParseError::InvalidFormat),
                b"wpt" => {
                    if let Some(pt) = parse_point(&e, &mut reader)? {
                        data.waypoints.push(pt);
                    }
                }
                b"rte" => data.routes.push(parse_route(&mut reader)?),
                b"trk" => data.tracks.push(parse_track_element(&mut reader)?),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"gpx" if !root_open => {
                    root_open = true;
                    root_closed = true;
                }
                _ if !root_open => return Err(ParseError::InvalidFormat),
                b"wpt" => {
                    if let Ok((lat, lon)) = parse_lat_lon(&e) {
                        data.waypoints.push(GpxPoint::new(lat, lon));
                    }
                }
                b"rte" => data.routes.push(GpxRoute::default()),
                b"trk" => data.tracks.push(GpxTrack::default()),
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"gpx" => root_closed = true,
            Event::Eof => break,
            _ => {}
        }
    }

    if !(root_open && root_closed) {
        return Err(ParseError::InvalidFormat);
    }

    Ok(data)
}

/// Parse lat/lon attributes from a point element's start tag.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<(f64, f64)> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr in e.attributes() {
        let attr = attr?;
        let val = std::str::from_utf8(&attr.value)?.trim();
        match attr.key.local_name().as_ref() {
            b"lat" => lat = val.parse::<f64>().ok(),
            b"lon" => lon = val.parse::<f64>().ok(),
            _ => {}
        }
    }

    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok((lat, lon)),
        _ => Err(ParseError::InvalidTrackData),
    }
}

/// Parse a point element (wpt, rtept, trkpt) and its children.
/// Called after receiving Event::Start for the point element.
fn parse_point<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
) -> Result<Option<GpxPoint>> {
    let Ok((lat, lon)) = parse_lat_lon(start) else {
        // Points without usable coordinates are dropped, not fatal
        reader.read_to_end(start.name())?;
        return Ok(None);
    };

    let mut point = GpxPoint::new(lat, lon);
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ele" => {
                    let text = read_text_owned(reader, &e)?;
                    point.ele = text.trim().parse::<f64>().ok().filter(|v| v.is_finite());
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(e) if e.name().0 == end_name.as_slice() => break,
            Event::Eof => return Err(ParseError::InvalidFormat),
            _ => {}
        }
    }

    Ok(Some(point))
}

/// Parse a <rte> element.
fn parse_route<'a>(reader: &mut Reader<&'a [u8]>) -> Result<GpxRoute> {
    let mut route = GpxRoute::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"name" => route.name = Some(read_text_owned(reader, &e)?),
                b"rtept" => {
                    if let Some(pt) = parse_point(&e, reader)? {
                        route.points.push(pt);
                    }
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"rtept" {
                    if let Ok((lat, lon)) = parse_lat_lon(&e) {
                        route.points.push(GpxPoint::new(lat, lon));
                    }
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"rte" => break,
            Event::Eof => return Err(ParseError::InvalidFormat),
            _ => {}
        }
    }

    Ok(route)
}

/// Parse a <trk> element.
fn parse_track_element<'a>(reader: &mut Reader<&'a [u8]>) -> Result<GpxTrack> {
    let mut track = GpxTrack::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"name" => track.name = Some(read_text_owned(reader, &e)?),
                b"trkseg" => track.segments.push(parse_segment(reader)?),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(e) if e.local_name().as_ref() == b"trk" => break,
            Event::Eof => return Err(ParseError::InvalidFormat),
            _ => {}
        }
    }

    Ok(track)
}

/// Parse a <trkseg> element.
fn parse_segment<'a>(reader: &mut Reader<&'a [u8]>) -> Result<GpxSegment> {
    let mut segment = GpxSegment::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"trkpt" => {
                    if let Some(pt) = parse_point(&e, reader)? {
                        segment.points.push(pt);
                    }
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"trkpt" {
                    if let Ok((lat, lon)) = parse_lat_lon(&e) {
                        segment.points.push(GpxPoint::new(lat, lon));
                    }
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"trkseg" => break,
            Event::Eof => return Err(ParseError::InvalidFormat),
            _ => {}
        }
    }

    Ok(segment)
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Text(e) => text.push_str(std::str::from_utf8(e.as_ref())?),
            Event::CData(e) => text.push_str(std::str::from_utf8(e.as_ref())?),
            Event::GeneralRef(e) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else {
                    match e.as_ref() {
                        b"amp" => text.push('&'),
                        b"lt" => text.push('<'),
                        b"gt" => text.push('>'),
                        b"quot" => text.push('"'),
                        b"apos" => text.push('\''),
                        _ => {}
                    }
                }
            }
            Event::End(e) if e.name().0 == end_name.as_slice() => break,
            Event::Eof => return Err(ParseError::InvalidFormat),
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_track() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <name>Col de la Croix</name>
    <trkseg>
      <trkpt lat="45.0" lon="6.0"><ele>1000.0</ele></trkpt>
      <trkpt lat="45.001" lon="6.001"><ele>1010.5</ele></trkpt>
      <trkpt lat="45.002" lon="6.002"><ele>1021.0</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.tracks.len(), 1);
        assert_eq!(data.tracks[0].name.as_deref(), Some("Col de la Croix"));
        let points = &data.tracks[0].segments[0].points;
        assert_eq!(points.len(), 3);
        assert!((points[1].ele.unwrap() - 1010.5).abs() < 1e-10);
    }

    #[test]
    fn test_route_points() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <rte>
    <name>Coast Road</name>
    <rtept lat="43.0" lon="5.0"/>
    <rtept lat="43.1" lon="5.1"><ele>12</ele></rtept>
  </rte>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.routes.len(), 1);
        assert_eq!(data.routes[0].name.as_deref(), Some("Coast Road"));
        assert_eq!(data.routes[0].points.len(), 2);
        assert_eq!(data.routes[0].points[0].ele, None);
        assert_eq!(data.routes[0].points[1].ele, Some(12.0));
    }

    #[test]
    fn test_with_namespace_and_extensions() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1">
  <metadata><name>ignored</name></metadata>
  <trk>
    <trkseg>
      <trkpt lat="35.0" lon="139.0">
        <time>2025-01-01T00:00:00Z</time>
        <extensions>
          <gpxtpx:TrackPointExtension xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
            <gpxtpx:hr>150</gpxtpx:hr>
          </gpxtpx:TrackPointExtension>
        </extensions>
      </trkpt>
      <trkpt lat="35.001" lon="139.001"/>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.tracks[0].segments[0].points.len(), 2);
    }

    #[test]
    fn test_cdata_and_entities_in_name() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk><name><![CDATA[Col & Pass]]> &amp; &#60;3</name></trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.tracks[0].name.as_deref(), Some("Col & Pass & <3"));
    }

    #[test]
    fn test_bad_points_skipped() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="45.0" lon="6.0"/>
      <trkpt lat="north" lon="6.1"><ele>3</ele></trkpt>
      <trkpt lon="6.2"/>
      <trkpt lat="45.3" lon="6.3"><ele>n/a</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        let points = &data.tracks[0].segments[0].points;
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].ele, None);
    }

    #[test]
    fn test_empty_gpx() {
        let data = parse_gpx(r#"<?xml version="1.0"?><gpx version="1.1"></gpx>"#).unwrap();
        assert!(data.waypoints.is_empty());
        assert!(!data.has_lines());

        let data = parse_gpx(r#"<gpx/>"#).unwrap();
        assert!(!data.has_lines());
    }

    #[test]
    fn test_self_closing_track_and_route_are_declared() {
        let data = parse_gpx(r#"<gpx><trk/><rte/></gpx>"#).unwrap();
        assert_eq!(data.tracks.len(), 1);
        assert_eq!(data.routes.len(), 1);
        assert!(data.has_lines());

        for xml in ["<gpx><trk/></gpx>", "<gpx><rte/></gpx>", "<gpx><trk></trk></gpx>"] {
            let err = parse_track(xml, &AnalysisOptions::default()).unwrap_err();
            assert!(matches!(err, RouteError::Parse(ParseError::NoCoordinates)), "{xml}");
        }
    }

    #[test]
    fn test_not_gpx_root() {
        let err = parse_gpx(r#"<?xml version="1.0"?><kml><Placemark/></kml>"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat));
    }

    #[test]
    fn test_empty_document() {
        assert!(matches!(parse_gpx("").unwrap_err(), ParseError::InvalidFormat));
        assert!(matches!(
            parse_gpx("just some text").unwrap_err(),
            ParseError::InvalidFormat
        ));
    }

    #[test]
    fn test_truncated_document() {
        let xml = r#"<gpx version="1.1"><trk><trkseg><trkpt lat="1" lon="2">"#;
        assert!(parse_gpx(xml).is_err());
    }

    #[test]
    fn test_mismatched_tags() {
        let xml = r#"<gpx version="1.1"><trk><trkseg></trk></trkseg></gpx>"#;
        assert!(parse_gpx(xml).is_err());
    }

    #[test]
    fn test_parse_track_bytes_rejects_invalid_utf8() {
        let bytes = b"<gpx>\xff\xfe</gpx>";
        let err = parse_track_bytes(bytes, &AnalysisOptions::default()).unwrap_err();
        assert!(matches!(err, RouteError::Parse(ParseError::Encoding(_))));
        assert!(err.to_string().starts_with("Failed to parse GPX file: "));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("connection reset"))
        }
    }

    #[test]
    fn test_parse_track_reader_wraps_io_errors() {
        let err = parse_track_reader(FailingReader, &AnalysisOptions::default()).unwrap_err();
        assert!(matches!(err, RouteError::Parse(ParseError::Io(_))));
        assert!(err.to_string().starts_with("Failed to parse GPX file: "));
        assert!(err.to_string().ends_with("connection reset"));
    }

    #[test]
    fn test_parse_track_reader() {
        let xml = r#"<gpx><trk><trkseg>
            <trkpt lat="0" lon="0"/><trkpt lat="0" lon="1"/>
        </trkseg></trk></gpx>"#;
        let parsed = parse_track_reader(xml.as_bytes(), &AnalysisOptions::default()).unwrap();
        assert_eq!(parsed.track.len(), 2);
        assert_eq!(parsed.bounds.max_lon, 1.0);
    }
}
