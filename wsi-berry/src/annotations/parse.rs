//! 各标注格式的解析. 每种格式一个函数, 都返回按标签首次出现顺序排列的多边形.

use super::error::{AnnotationError, AnnotationResult};
use super::Polygon;
use crate::geometry::Pt;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 按标签分组的多边形.
pub(super) type Parsed = Vec<(String, Vec<Polygon>)>;

/// CSV 中空标签的替代名.
pub(super) const UNDEFINED_LABEL: &str = "undefined";

fn push_polygon(parsed: &mut Parsed, label: &str, poly: Polygon) {
    match parsed.iter_mut().find(|(l, _)| l == label) {
        Some((_, v)) => v.push(poly),
        None => parsed.push((label.to_string(), vec![poly])),
    }
}

fn ensure_label(parsed: &mut Parsed, label: &str) {
    if !parsed.iter().any(|(l, _)| l == label) {
        parsed.push((label.to_string(), Vec::new()));
    }
}

fn coord(s: &str) -> AnnotationResult<i32> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.round() as i32)
        .ok_or_else(|| AnnotationError::Coordinate(s.to_string()))
}

fn json_coord(v: &Value) -> AnnotationResult<i32> {
    match v {
        Value::Number(n) => n
            .as_f64()
            .map(|f| f.round() as i32)
            .ok_or_else(|| AnnotationError::Coordinate(n.to_string())),
        Value::String(s) => coord(s),
        other => Err(AnnotationError::Coordinate(other.to_string())),
    }
}

/// XML 标注的元素名.
struct XmlSchema {
    annotation: &'static [u8],
    label_attr: &'static [u8],
    polygon: &'static [u8],
    point: &'static [u8],
}

const IMAGEJ: XmlSchema = XmlSchema {
    annotation: b"Annotation",
    label_attr: b"Name",
    polygon: b"Vertices",
    point: b"Vertex",
};

const ASAP: XmlSchema = XmlSchema {
    annotation: b"Annotation",
    label_attr: b"PartOfGroup",
    polygon: b"Coordinates",
    point: b"Coordinate",
};

fn attr(e: &BytesStart, key: &[u8]) -> AnnotationResult<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(quick_xml::Error::from)?;
        if a.key.as_ref() == key {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn point(e: &BytesStart) -> AnnotationResult<Pt> {
    let x = attr(e, b"X")?.ok_or_else(|| AnnotationError::Layout("point without X".into()))?;
    let y = attr(e, b"Y")?.ok_or_else(|| AnnotationError::Layout("point without Y".into()))?;
    Ok(Pt::new(coord(&x)?, coord(&y)?))
}

fn parse_xml(path: &Path, schema: &XmlSchema) -> AnnotationResult<Parsed> {
    let mut reader = Reader::from_file(path)?;
    let mut buf = Vec::new();
    let mut parsed = Parsed::new();
    let mut label: Option<String> = None;
    let mut poly: Option<Polygon> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == schema.annotation => {
                let l = attr(&e, schema.label_attr)?.ok_or_else(|| {
                    AnnotationError::Layout(format!(
                        "annotation without `{}`",
                        String::from_utf8_lossy(schema.label_attr)
                    ))
                })?;
                ensure_label(&mut parsed, &l);
                label = Some(l);
            }
            Event::Start(e) if e.name().as_ref() == schema.polygon => {
                poly = Some(Polygon::new());
            }
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == schema.point => {
                if let Some(p) = poly.as_mut() {
                    p.push(point(&e)?);
                }
            }
            Event::End(e) if e.name().as_ref() == schema.polygon => {
                if let (Some(l), Some(p)) = (label.as_deref(), poly.take()) {
                    push_polygon(&mut parsed, l, p);
                }
            }
            Event::End(e) if e.name().as_ref() == schema.annotation => {
                label = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(parsed)
}

/// ImageJ XML: `Annotation[Name]/.../Vertices/Vertex[X, Y]`.
pub(super) fn imagej(path: &Path) -> AnnotationResult<Parsed> {
    parse_xml(path, &IMAGEJ)
}

/// ASAP XML: `Annotation[PartOfGroup]/Coordinates/Coordinate[X, Y]`.
pub(super) fn asap(path: &Path) -> AnnotationResult<Parsed> {
    parse_xml(path, &ASAP)
}

fn json_ring(v: &Value) -> AnnotationResult<Polygon> {
    let pts = v
        .as_array()
        .ok_or_else(|| AnnotationError::Layout("coordinates are not an array".into()))?;
    pts.iter()
        .map(|p| match p.as_array().map(Vec::as_slice) {
            Some([x, y, ..]) => Ok(Pt::new(json_coord(x)?, json_coord(y)?)),
            _ => Err(AnnotationError::Coordinate(p.to_string())),
        })
        .collect()
}

fn json_array<'v>(v: &'v Value, what: &str) -> AnnotationResult<&'v Vec<Value>> {
    v.as_array()
        .ok_or_else(|| AnnotationError::Layout(format!("{what} is not an array")))
}

/// QuPath GeoJSON. 类别取自 `properties.classification.name`,
/// 支持 `LineString`, `Polygon` 和 `MultiPolygon`; 其他几何类型被忽略.
pub(super) fn qupath(path: &Path) -> AnnotationResult<Parsed> {
    let root: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    let features = match &root {
        Value::Array(a) => a,
        Value::Object(o) => o
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| AnnotationError::Layout("no `features` array".into()))?,
        _ => return Err(AnnotationError::Layout("not a feature list".into())),
    };

    let mut parsed = Parsed::new();
    for f in features {
        let label = f
            .pointer("/properties/classification/name")
            .and_then(Value::as_str)
            .ok_or_else(|| AnnotationError::Layout("feature without classification".into()))?;
        let kind = f.pointer("/geometry/type").and_then(Value::as_str);
        let coords = f
            .pointer("/geometry/coordinates")
            .ok_or_else(|| AnnotationError::Layout("feature without coordinates".into()))?;
        ensure_label(&mut parsed, label);
        match kind {
            Some("LineString") => push_polygon(&mut parsed, label, json_ring(coords)?),
            Some("Polygon") => {
                for ring in json_array(coords, "polygon")? {
                    push_polygon(&mut parsed, label, json_ring(ring)?);
                }
            }
            Some("MultiPolygon") => {
                for poly in json_array(coords, "multipolygon")? {
                    for ring in json_array(poly, "polygon")? {
                        push_polygon(&mut parsed, label, json_ring(ring)?);
                    }
                }
            }
            other => log::warn!("ignored geometry {other:?} of `{label}`"),
        }
    }
    Ok(parsed)
}

/// `{label: {id: [{"x": .., "y": ..}, ...]}}`.
pub(super) fn json(path: &Path) -> AnnotationResult<Parsed> {
    let root: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    let labels = root
        .as_object()
        .ok_or_else(|| AnnotationError::Layout("top level is not an object".into()))?;

    let mut parsed = Parsed::new();
    for (label, instances) in labels {
        ensure_label(&mut parsed, label);
        let instances = instances
            .as_object()
            .ok_or_else(|| AnnotationError::Layout(format!("`{label}` is not an object")))?;
        for pts in instances.values() {
            let poly = json_array(pts, "instance")?
                .iter()
                .map(|p| -> AnnotationResult<Pt> {
                    Ok(Pt::new(json_coord(&p["x"])?, json_coord(&p["y"])?))
                })
                .collect::<AnnotationResult<Polygon>>()?;
            push_polygon(&mut parsed, label, poly);
        }
    }
    Ok(parsed)
}

fn column(headers: &csv::StringRecord, name: &str) -> AnnotationResult<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| AnnotationError::Layout(format!("missing column `{name}`")))
}

fn label_of(s: &str) -> &str {
    match s.trim() {
        "" => UNDEFINED_LABEL,
        l => l,
    }
}

/// `labels,x,y`. 每个标签的所有点构成一个多边形, 空标签记为 `undefined`.
pub(super) fn csv(path: &Path) -> AnnotationResult<Parsed> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let (li, xi, yi) = (
        column(&headers, "labels")?,
        column(&headers, "x")?,
        column(&headers, "y")?,
    );

    let mut parsed = Parsed::new();
    for rec in rdr.records() {
        let rec = rec?;
        let label = label_of(rec.get(li).unwrap_or_default());
        let p = Pt::new(
            coord(rec.get(xi).unwrap_or_default())?,
            coord(rec.get(yi).unwrap_or_default())?,
        );
        match parsed.iter_mut().find(|(l, _)| l == label) {
            Some((_, polys)) => match polys.last_mut() {
                Some(poly) => poly.push(p),
                None => polys.push(vec![p]),
            },
            None => parsed.push((label.to_string(), vec![vec![p]])),
        }
    }
    Ok(parsed)
}

/// `labels,polygon,x,y`, 即 [`super::Annotations::save`] 的输出. 多边形编号相同且连续的点
/// 属于同一个多边形.
pub(super) fn dataframe(path: &Path) -> AnnotationResult<Parsed> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let (li, pi, xi, yi) = (
        column(&headers, "labels")?,
        column(&headers, "polygon")?,
        column(&headers, "x")?,
        column(&headers, "y")?,
    );

    let mut parsed = Parsed::new();
    let mut last: Option<(String, String)> = None;
    for rec in rdr.records() {
        let rec = rec?;
        let label = label_of(rec.get(li).unwrap_or_default()).to_string();
        let poly_id = rec.get(pi).unwrap_or_default().trim().to_string();
        let p = Pt::new(
            coord(rec.get(xi).unwrap_or_default())?,
            coord(rec.get(yi).unwrap_or_default())?,
        );
        let key = (label, poly_id);
        let same = last.as_ref() == Some(&key);
        let polys = match parsed.iter_mut().position(|(l, _)| *l == key.0) {
            Some(i) => &mut parsed[i].1,
            None => {
                parsed.push((key.0.clone(), Vec::new()));
                let n = parsed.len();
                &mut parsed[n - 1].1
            }
        };
        match polys.last_mut() {
            Some(poly) if same => poly.push(p),
            _ => polys.push(vec![p]),
        }
        last = Some(key);
    }
    Ok(parsed)
}
