use std::collections::HashMap;
use std::sync::LazyLock;

/// 类别分组：目标类别 => 可接受的类别
const CATEGORY_GROUP_TABLE: &[(&str, &[&str])] = &[
    ("shirt", &["shirt", "t-shirt", "top", "blouse", "polo"]),
    ("t-shirt", &["shirt", "t-shirt", "top"]),
    ("top", &["shirt", "t-shirt", "top", "blouse"]),
    ("blouse", &["blouse", "top", "shirt"]),
    ("sweater", &["sweater", "cardigan", "pullover", "hoodie"]),
    ("jacket", &["jacket", "coat", "blazer", "hoodie"]),
    ("hoodie", &["hoodie", "sweater", "jacket"]),
    ("pants", &["pants", "trousers", "jeans", "chinos"]),
    ("jeans", &["jeans", "pants", "denim"]),
    ("trousers", &["trousers", "pants", "chinos"]),
    ("shorts", &["shorts"]),
    ("leggings", &["leggings", "tights"]),
    ("skirt", &["skirt"]),
    ("dress", &["dress", "gown", "frock"]),
    ("gown", &["gown", "dress"]),
    ("jumpsuit", &["jumpsuit", "romper"]),
    ("saree", &["saree", "sari"]),
    ("shoes", &["shoes", "sneakers", "footwear"]),
    ("sneakers", &["sneakers", "shoes", "trainers"]),
    ("sandals", &["sandals", "slippers", "flats"]),
    ("boots", &["boots", "shoes"]),
    ("heels", &["heels", "pumps", "shoes"]),
    ("watch", &["watch", "smartwatch"]),
    ("bracelet", &["bracelet", "bangle"]),
    ("necklace", &["necklace", "chain", "pendant"]),
    ("earrings", &["earrings", "studs"]),
    ("ring", &["ring"]),
    ("bag", &["bag", "purse", "handbag", "tote"]),
    ("backpack", &["backpack", "bag"]),
    // 父类别
    (
        "upperwear",
        &[
            "shirt", "t-shirt", "top", "blouse", "sweater", "jacket", "hoodie", "cardigan",
            "coat",
        ],
    ),
    (
        "lowerwear",
        &["pants", "jeans", "trousers", "shorts", "leggings", "skirt", "palazzo"],
    ),
    (
        "footwear",
        &["shoes", "sneakers", "sandals", "boots", "heels", "slippers", "loafers"],
    ),
    (
        "accessories",
        &[
            "watch",
            "bracelet",
            "necklace",
            "earrings",
            "ring",
            "bag",
            "purse",
            "handbag",
            "backpack",
            "belt",
            "scarf",
            "hat",
            "cap",
            "sunglasses",
        ],
    ),
];

pub static CATEGORY_GROUPS: LazyLock<HashMap<&'static str, &'static [&'static str]>> =
    LazyLock::new(|| CATEGORY_GROUP_TABLE.iter().copied().collect());

/// 一种标准颜色的三级近似色
#[derive(Debug, Clone, Copy)]
pub struct ColorTiers {
    pub exact: &'static [&'static str],
    pub similar: &'static [&'static str],
    pub related: &'static [&'static str],
}

const fn tiers(
    exact: &'static [&'static str],
    similar: &'static [&'static str],
    related: &'static [&'static str],
) -> ColorTiers {
    ColorTiers { exact, similar, related }
}

/// 颜色相似度表：查询颜色 => 三级近似色
pub static COLOR_SIMILARITY: LazyLock<HashMap<&'static str, ColorTiers>> = LazyLock::new(|| {
    HashMap::from([
        ("red", tiers(&["red"], &["crimson", "scarlet", "cherry"], &["maroon", "pink", "orange"])),
        (
            "maroon",
            tiers(&["maroon"], &["burgundy", "wine", "bordeaux"], &["red", "brown", "purple"]),
        ),
        ("pink", tiers(&["pink"], &["rose", "blush", "coral"], &["red", "purple", "peach"])),
        ("blue", tiers(&["blue"], &["azure", "cobalt", "royal"], &["navy", "teal", "purple"])),
        ("navy", tiers(&["navy"], &["midnight", "dark blue"], &["blue", "black"])),
        ("teal", tiers(&["teal"], &["turquoise", "cyan", "aqua"], &["blue", "green"])),
        ("green", tiers(&["green"], &["emerald", "lime", "mint"], &["olive", "teal", "khaki"])),
        ("olive", tiers(&["olive"], &["army", "military"], &["green", "brown", "khaki"])),
        (
            "yellow",
            tiers(&["yellow"], &["gold", "golden", "amber"], &["orange", "beige", "mustard"]),
        ),
        (
            "orange",
            tiers(&["orange"], &["tangerine", "rust"], &["red", "yellow", "brown", "peach"]),
        ),
        (
            "white",
            tiers(&["white"], &["ivory", "cream", "off-white"], &["beige", "grey", "silver"]),
        ),
        ("black", tiers(&["black"], &["ebony", "jet", "onyx"], &["grey", "navy", "charcoal"])),
        (
            "grey",
            tiers(&["grey", "gray"], &["charcoal", "slate", "silver", "ash"], &["black", "white"]),
        ),
        (
            "brown",
            tiers(
                &["brown"],
                &["chocolate", "coffee", "tan"],
                &["beige", "orange", "maroon", "khaki"],
            ),
        ),
        (
            "beige",
            tiers(&["beige"], &["tan", "nude", "cream", "camel"], &["brown", "white", "khaki"]),
        ),
        (
            "purple",
            tiers(&["purple"], &["violet", "lavender", "plum"], &["pink", "blue", "maroon"]),
        ),
        ("gold", tiers(&["gold"], &["golden", "brass"], &["yellow", "brown", "orange"])),
        ("silver", tiers(&["silver"], &["chrome", "metallic"], &["grey", "white"])),
    ])
});

/// 分类器容易混淆的类别组
const AMBIGUOUS_GROUP_TABLE: &[(&str, &[&str])] = &[
    // 连衣裙和半身裙经常分错
    ("dress", &["dress", "lowerwear"]),
    ("lowerwear", &["lowerwear", "dress"]),
    ("upperwear", &["upperwear"]),
    ("footwear", &["footwear"]),
    ("accessories", &["accessories"]),
];

pub static AMBIGUOUS_GROUPS: LazyLock<HashMap<&'static str, &'static [&'static str]>> =
    LazyLock::new(|| AMBIGUOUS_GROUP_TABLE.iter().copied().collect());
