// testkit.rs — Builders for serialized node text in unit tests

/// One `CustomProperties Pin` record.
#[derive(Debug, Clone)]
pub struct P {
    key: String,
    name: String,
    category: String,
    sub_category: String,
    sub_object: String,
    container: Option<String>,
    default: Option<String>,
    default_object: Option<String>,
    links: Vec<(String, String)>,
    sub_pins: Vec<(String, String)>,
    parent: Option<(String, String)>,
    output: bool,
}

impl P {
    fn new(key: &str, name: &str, category: &str, output: bool) -> P {
        P {
            key: key.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            sub_category: String::new(),
            sub_object: "None".to_string(),
            container: None,
            default: None,
            default_object: None,
            links: Vec::new(),
            sub_pins: Vec::new(),
            parent: None,
            output,
        }
    }

    pub fn exec_in(key: &str) -> P {
        P::new(key, "execute", "exec", false)
    }

    pub fn exec_out(key: &str, name: &str) -> P {
        P::new(key, name, "exec", true)
    }

    pub fn input(key: &str, name: &str, category: &str) -> P {
        P::new(key, name, category, false)
    }

    pub fn output(key: &str, name: &str, category: &str) -> P {
        P::new(key, name, category, true)
    }

    pub fn sub_category(mut self, sub: &str) -> P {
        self.sub_category = sub.to_string();
        self
    }

    pub fn sub_object(mut self, path: &str) -> P {
        self.sub_object = format!("Class'\"{path}\"'");
        self
    }

    pub fn container(mut self, kind: &str) -> P {
        self.container = Some(kind.to_string());
        self
    }

    pub fn default(mut self, value: &str) -> P {
        self.default = Some(value.to_string());
        self
    }

    pub fn default_object(mut self, path: &str) -> P {
        self.default_object = Some(path.to_string());
        self
    }

    pub fn link(mut self, node: &str, key: &str) -> P {
        self.links.push((node.to_string(), key.to_string()));
        self
    }

    pub fn sub_pins(mut self, node: &str, keys: &[&str]) -> P {
        self.sub_pins
            .extend(keys.iter().map(|k| (node.to_string(), k.to_string())));
        self
    }

    pub fn parent(mut self, node: &str, key: &str) -> P {
        self.parent = Some((node.to_string(), key.to_string()));
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "   CustomProperties Pin (PinId={},PinName=\"{}\",PinType.PinCategory=\"{}\",PinType.PinSubCategory=\"{}\",PinType.PinSubCategoryObject={},",
            self.key, self.name, self.category, self.sub_category, self.sub_object
        );
        if let Some(kind) = &self.container {
            out.push_str(&format!("PinType.ContainerType={kind},"));
        }
        if let Some(value) = &self.default {
            out.push_str(&format!("DefaultValue=\"{value}\","));
        }
        if let Some(object) = &self.default_object {
            out.push_str(&format!("DefaultObject=\"{object}\","));
        }
        if let Some((node, key)) = &self.parent {
            out.push_str(&format!("ParentPin={node} {key},"));
        }
        if !self.sub_pins.is_empty() {
            out.push_str(&format!("SubPins=({}),", endpoints(&self.sub_pins)));
        }
        if !self.links.is_empty() {
            out.push_str(&format!("LinkedTo=({}),", endpoints(&self.links)));
        }
        if self.output {
            out.push_str("Direction=\"EGPD_Output\",");
        }
        out.push_str(")\n");
        out
    }
}

fn endpoints(list: &[(String, String)]) -> String {
    list.iter().map(|(n, k)| format!("{n} {k},")).collect()
}

/// One `Begin Object … End Object` block. `class` is the leaf class name.
pub fn node(class: &str, name: &str, extra: &[&str], pins: &[P]) -> String {
    let mut out = format!(
        "Begin Object Class=/Script/BlueprintGraph.{class} Name=\"{name}\"\n"
    );
    for line in extra {
        out.push_str("   ");
        out.push_str(line);
        out.push('\n');
    }
    for pin in pins {
        out.push_str(&pin.render());
    }
    out.push_str("End Object\n");
    out
}

/// A `K2Node_CallFunction` with the given member reference.
pub fn call(name: &str, parent: Option<&str>, member: &str, pins: &[P]) -> String {
    let reference = match parent {
        Some(p) => format!(
            "FunctionReference=(MemberParent=Class'\"/Script/Engine.{p}\"',MemberName=\"{member}\")"
        ),
        None => format!("FunctionReference=(MemberName=\"{member}\",bSelfContext=True)"),
    };
    node("K2Node_CallFunction", name, &[&reference], pins)
}
